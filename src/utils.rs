use crate::{BoardConnection, BusTransport, Conf, Result};
use log::info;

/// Applies the trigger and acquisition sections of `config` to an open board.
///
/// Stops at the first failing operation.
pub fn configure_board<T: BusTransport>(
    board: &mut BoardConnection<T>,
    config: &Conf,
) -> Result<()> {
    let acq = &config.acquisition;
    if acq.initialize {
        board.initialize()?;
    }
    if let Some(mode) = acq.mode {
        board.set_acquisition_mode(mode)?;
    }
    if let Some(mode) = acq.zs_mode {
        board.set_zs_mode(mode)?;
    }
    for settings in &acq.zle_channels {
        board.set_zle_channel_settings(settings)?;
    }

    let trig = &config.trigger;
    if let Some(mask) = trig.auto_trigger_mask {
        let all = board.topology().channel_mask();
        board.disable_auto_trigger(all & !mask)?;
        board.enable_auto_trigger(mask)?;
    }
    match trig.external_trigger {
        Some(logic) => board.enable_external_trigger(logic)?,
        None => board.disable_external_trigger()?,
    }
    if trig.sw_trigger {
        board.enable_sw_trigger()?;
    } else {
        board.disable_sw_trigger()?;
    }
    for edge in &trig.edges {
        board.set_trigger_edge(edge.channel, edge.edge)?;
    }
    if let Some(level) = trig.coincidence_level {
        board.set_trigger_coincidence(true, level)?;
    }

    info!("Board {}: configuration applied", board.board_id());
    Ok(())
}

/// Parses a register address or value given in decimal or `0x` hex.
pub fn parse_u32(text: &str) -> std::result::Result<u32, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid 32-bit value '{text}': {e}"))
}
