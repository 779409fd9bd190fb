use crate::registers;
use crate::{BoardConnection, BusTransport, Result};
use log::{info, warn};

/// Global registers included in the diagnostic dump.
const DIGITIZER_PARAMS: &[(&str, u32)] = &[
    ("ChannelConfig", registers::BROADCAST_CH_CONFIG),
    ("AcqControl", registers::ACQ_CONTROL),
    ("TriggerSrcEnable", registers::TRIGGER_SRC_ENABLE),
    ("FPTriggerOutEnable", registers::FP_TRIGGER_OUT_ENABLE),
    ("FrontPanelIOCtrl", registers::FRONT_PANEL_IO_CTRL),
    ("ChannelEnableMask", registers::CHANNEL_ENABLE_MASK),
    ("EventStored", registers::EVENT_STORED),
    ("VMEControl", registers::VME_CONTROL),
];

/// Per-channel register families read for every channel of a board.
const CHANNEL_PARAMS: &[(&str, u32)] = &[
    ("ZSThreshold", registers::CHANNEL_ZS_THRESHOLD_BASE),
    ("ZSNSamples", registers::CHANNEL_ZS_NSAMPLE_BASE),
    ("TriggerCtrl", registers::CHANNEL_TRIGGER_CTRL_BASE),
    ("ChStatus", registers::CHANNEL_STATUS_BASE),
];

/// Reads every named register of the board into a printable listing.
///
/// Fails up front when the link is not open. Registers that fail to read are
/// logged and skipped.
pub fn dump_registers<T: BusTransport>(board: &mut BoardConnection<T>) -> Result<String> {
    board.ensure_open()?;
    let mut param_log = String::new();

    for &(param, address) in DIGITIZER_PARAMS {
        match board.get_register(address) {
            Ok(value) => {
                param_log.push_str(&format!("{param} [0x{address:04X}]: 0x{value:08X}\n"));
            }
            Err(e) => warn!("Failed to read {param} [0x{address:04X}]: {e}"),
        }
    }

    let num_channels = board.topology().channel_count;
    for &(ch_param, base) in CHANNEL_PARAMS {
        for ch in 0..num_channels {
            let address = registers::channel_register(base, ch);
            match board.get_register(address) {
                Ok(value) => {
                    param_log.push_str(&format!(
                        "{ch_param}[{ch}] [0x{address:04X}]: 0x{value:08X}\n"
                    ));
                }
                Err(e) => {
                    warn!("Failed to read {ch_param}[{ch}] [0x{address:04X}]: {e}");
                    continue;
                }
            }
        }
    }

    if param_log.ends_with('\n') {
        param_log.pop();
    }
    Ok(param_log)
}

pub fn log_all<T: BusTransport>(boards: &mut [BoardConnection<T>]) {
    for board in boards {
        match dump_registers(board) {
            Ok(param_log) => {
                info!("Digitizer {} registers:\n{}", board.board_id(), param_log)
            }
            Err(e) => warn!("Digitizer {}: register dump skipped: {}", board.board_id(), e),
        }
    }
}
