//! Trigger configuration.
//!
//! Every trigger source has an acquisition enable bit in `TRIGGER_SRC_ENABLE`
//! and a propagation bit at the same position in `FP_TRIGGER_OUT_ENABLE`.
//! A [`TriggerMode`] decides which of the two are set.

use crate::registers::{self, channel_trigger, front_panel, trigger_src};
use crate::{BoardConnection, BusTransport, DigitizerError, Result};
use log::info;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerMode {
    Disabled,
    AcqOnly,
    ExtOutOnly,
    AcqAndExtOut,
}

impl TriggerMode {
    /// (acquisition enabled, propagated to TRG-OUT)
    pub fn bits(self) -> (bool, bool) {
        match self {
            Self::Disabled => (false, false),
            Self::AcqOnly => (true, false),
            Self::ExtOutOnly => (false, true),
            Self::AcqAndExtOut => (true, true),
        }
    }
}

/// Logic standard of the external trigger input.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalLogic {
    #[serde(rename = "NIM")]
    Nim,
    #[serde(rename = "TTL")]
    Ttl,
}

impl FromStr for SignalLogic {
    type Err = DigitizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NIM" => Ok(Self::Nim),
            "TTL" => Ok(Self::Ttl),
            other => Err(DigitizerError::Unsupported {
                parameter: "external trigger logic (select 'NIM' or 'TTL')",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SignalLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nim => "NIM",
            Self::Ttl => "TTL",
        })
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEdge {
    Rising,
    Falling,
}

impl TriggerEdge {
    /// Value of the polarity field in the channel trigger control register.
    pub fn polarity_code(self) -> u32 {
        match self {
            Self::Rising => 0,
            Self::Falling => channel_trigger::POLARITY_FALLING,
        }
    }
}

impl FromStr for TriggerEdge {
    type Err = DigitizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Rising" => Ok(Self::Rising),
            "Falling" => Ok(Self::Falling),
            other => Err(DigitizerError::Unsupported {
                parameter: "trigger edge (select 'Rising' or 'Falling')",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TriggerEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rising => "Rising",
            Self::Falling => "Falling",
        })
    }
}

impl<T: BusTransport> BoardConnection<T> {
    /// Sets the self-trigger of every channel in `channel_mask` to acquire only.
    pub fn enable_auto_trigger(&mut self, channel_mask: u32) -> Result<()> {
        let result = self.set_channel_self_trigger(TriggerMode::AcqOnly, channel_mask);
        self.record(result)
    }

    pub fn disable_auto_trigger(&mut self, channel_mask: u32) -> Result<()> {
        let result = self.set_channel_self_trigger(TriggerMode::Disabled, channel_mask);
        self.record(result)
    }

    /// Enables the external trigger (acquire and propagate) with the given input logic.
    pub fn enable_external_trigger(&mut self, logic: SignalLogic) -> Result<()> {
        let result = self
            .set_source_mode(trigger_src::EXTERNAL, TriggerMode::AcqAndExtOut)
            .and_then(|_| {
                self.modify(registers::FRONT_PANEL_IO_CTRL, |value| match logic {
                    SignalLogic::Nim => value & !front_panel::TTL,
                    SignalLogic::Ttl => value | front_panel::TTL,
                })
            })
            .map(|_| info!("Board {}: external trigger enabled ({})", self.board_id(), logic));
        self.record(result)
    }

    pub fn disable_external_trigger(&mut self) -> Result<()> {
        let result = self.set_source_mode(trigger_src::EXTERNAL, TriggerMode::Disabled);
        self.record(result)
    }

    pub fn enable_sw_trigger(&mut self) -> Result<()> {
        let result = self.set_source_mode(trigger_src::SOFTWARE, TriggerMode::AcqOnly);
        self.record(result)
    }

    pub fn disable_sw_trigger(&mut self) -> Result<()> {
        let result = self.set_source_mode(trigger_src::SOFTWARE, TriggerMode::Disabled);
        self.record(result)
    }

    /// Sets the trigger polarity of a single channel.
    pub fn set_trigger_edge(&mut self, channel: u32, edge: TriggerEdge) -> Result<()> {
        let result = self.check_channel(channel).and_then(|_| {
            let address =
                registers::channel_register(registers::CHANNEL_TRIGGER_CTRL_BASE, channel);
            self.modify(address, |value| {
                (value & !channel_trigger::POLARITY_FALLING) | edge.polarity_code()
            })
            .map(|_| ())
        });
        self.record(result)
    }

    /// Arms the trigger coincidence level.
    ///
    /// The level is OR-merged into bits [27:24] of the trigger source mask and
    /// every lower bit is preserved. With `enable == false` nothing is sent:
    /// clearing a level takes a direct register write.
    pub fn set_trigger_coincidence(&mut self, enable: bool, level: u32) -> Result<()> {
        let result = if !enable {
            Err(DigitizerError::CoincidenceNotEnabled)
        } else if let Err(e) = self.ensure_open() {
            Err(e)
        } else if level > trigger_src::COINCIDENCE_MAX {
            Err(DigitizerError::ValueOutOfRange {
                parameter: "coincidence level",
                value: level,
                max: trigger_src::COINCIDENCE_MAX,
            })
        } else {
            self.modify(registers::TRIGGER_SRC_ENABLE, |mask| {
                mask | (level << trigger_src::COINCIDENCE_SHIFT)
            })
            .map(|_| ())
        };
        self.record(result)
    }

    fn set_channel_self_trigger(&mut self, mode: TriggerMode, channel_mask: u32) -> Result<()> {
        self.ensure_open()?;
        let valid = self.topology().channel_mask() & trigger_src::CHANNEL_MASK;
        let stray = channel_mask & !valid;
        if stray != 0 {
            return Err(DigitizerError::ChannelOutOfRange {
                channel: stray.trailing_zeros(),
                count: self.topology().channel_count,
            });
        }
        self.set_source_mode(channel_mask, mode)
    }

    fn set_source_mode(&mut self, source_bits: u32, mode: TriggerMode) -> Result<()> {
        let (acquire, propagate) = mode.bits();
        self.modify(registers::TRIGGER_SRC_ENABLE, |mask| {
            apply_bits(mask, source_bits, acquire)
        })?;
        self.modify(registers::FP_TRIGGER_OUT_ENABLE, |mask| {
            apply_bits(mask, source_bits, propagate)
        })?;
        Ok(())
    }
}

fn apply_bits(value: u32, bits: u32, set: bool) -> u32 {
    if set {
        value | bits
    } else {
        value & !bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::{closed_board, open_board, open_board_with};
    use crate::{CommandStatus, SimulatedTransport};

    #[test]
    fn nim_clears_and_ttl_sets_bit_zero() {
        let sim = SimulatedTransport::default()
            .with_register(registers::FRONT_PANEL_IO_CTRL, 0x0000_0043);
        let mut board = open_board_with(sim);

        board.enable_external_trigger(SignalLogic::Nim).unwrap();
        assert_eq!(board.transport().peek(registers::FRONT_PANEL_IO_CTRL), 0x0000_0042);

        board.enable_external_trigger(SignalLogic::Ttl).unwrap();
        assert_eq!(board.transport().peek(registers::FRONT_PANEL_IO_CTRL), 0x0000_0043);

        let src = board.transport().peek(registers::TRIGGER_SRC_ENABLE);
        let out = board.transport().peek(registers::FP_TRIGGER_OUT_ENABLE);
        assert_ne!(src & trigger_src::EXTERNAL, 0);
        assert_ne!(out & trigger_src::EXTERNAL, 0);
    }

    #[test]
    fn unknown_logic_writes_nothing() {
        let sim = SimulatedTransport::default()
            .with_register(registers::FRONT_PANEL_IO_CTRL, 0x0000_0043);
        let mut board = open_board_with(sim);
        let parsed = board.parse_setting::<SignalLogic>("XYZ");
        assert!(matches!(parsed, Err(DigitizerError::Unsupported { .. })));
        assert_eq!(board.last_status(), CommandStatus::UNSUPPORTED);
        assert_eq!(board.transport().peek(registers::FRONT_PANEL_IO_CTRL), 0x0000_0043);
        assert_eq!(board.transport().call_count(), 0);
    }

    #[test]
    fn disabling_external_trigger_clears_both_masks() {
        let sim = SimulatedTransport::default()
            .with_register(registers::TRIGGER_SRC_ENABLE, 0xC000_0080)
            .with_register(registers::FP_TRIGGER_OUT_ENABLE, 0x4000_0000);
        let mut board = open_board_with(sim);
        board.disable_external_trigger().unwrap();
        assert_eq!(board.transport().peek(registers::TRIGGER_SRC_ENABLE), 0x8000_0080);
        assert_eq!(board.transport().peek(registers::FP_TRIGGER_OUT_ENABLE), 0);
    }

    #[test]
    fn software_trigger_toggles_bit_31() {
        let mut board = open_board();
        board.enable_sw_trigger().unwrap();
        assert_eq!(board.transport().peek(registers::TRIGGER_SRC_ENABLE), trigger_src::SOFTWARE);
        assert_eq!(board.transport().peek(registers::FP_TRIGGER_OUT_ENABLE), 0);
        board.disable_sw_trigger().unwrap();
        assert_eq!(board.transport().peek(registers::TRIGGER_SRC_ENABLE), 0);
    }

    #[test]
    fn auto_trigger_only_touches_masked_channels() {
        let sim = SimulatedTransport::default()
            .with_register(registers::TRIGGER_SRC_ENABLE, 0x0000_0081);
        let mut board = open_board_with(sim);
        board.enable_auto_trigger(0b0000_0110).unwrap();
        assert_eq!(board.transport().peek(registers::TRIGGER_SRC_ENABLE), 0x0000_0087);
        board.disable_auto_trigger(0b1000_0010).unwrap();
        assert_eq!(board.transport().peek(registers::TRIGGER_SRC_ENABLE), 0x0000_0005);
    }

    #[test]
    fn auto_trigger_rejects_missing_channels() {
        let mut board = open_board();
        assert_eq!(
            board.enable_auto_trigger(1 << 9),
            Err(DigitizerError::ChannelOutOfRange { channel: 9, count: 8 })
        );
        assert_eq!(board.transport().call_count(), 0);
    }

    #[test]
    fn coincidence_level_merges_above_bit_24() {
        let sim = SimulatedTransport::default()
            .with_register(registers::TRIGGER_SRC_ENABLE, 0x0000_0080);
        let mut board = open_board_with(sim);
        board.set_trigger_coincidence(true, 5).unwrap();
        assert_eq!(board.transport().peek(registers::TRIGGER_SRC_ENABLE), 0x0500_0080);
    }

    #[test]
    fn disarmed_coincidence_is_a_no_op() {
        let sim = SimulatedTransport::default()
            .with_register(registers::TRIGGER_SRC_ENABLE, 0x0000_0080);
        let mut board = open_board_with(sim);
        assert_eq!(
            board.set_trigger_coincidence(false, 5),
            Err(DigitizerError::CoincidenceNotEnabled)
        );
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert_eq!(board.transport().call_count(), 0);
        assert_eq!(board.transport().peek(registers::TRIGGER_SRC_ENABLE), 0x0000_0080);
    }

    #[test]
    fn coincidence_level_above_four_bits_is_rejected() {
        let mut board = open_board();
        assert!(matches!(
            board.set_trigger_coincidence(true, 16),
            Err(DigitizerError::ValueOutOfRange { .. })
        ));
        assert_eq!(board.transport().call_count(), 0);
    }

    #[test]
    fn trigger_edge_touches_one_channel() {
        let mut board = open_board();
        let ch3 = registers::channel_register(registers::CHANNEL_TRIGGER_CTRL_BASE, 3);

        board.set_trigger_edge(3, TriggerEdge::Falling).unwrap();
        assert_eq!(board.transport().peek(ch3), channel_trigger::POLARITY_FALLING);
        board.set_trigger_edge(3, TriggerEdge::Rising).unwrap();
        assert_eq!(board.transport().peek(ch3), 0);

        assert_ne!(
            TriggerEdge::Rising.polarity_code(),
            TriggerEdge::Falling.polarity_code()
        );
        assert!(board.transport().writes().iter().all(|&(addr, _)| addr == ch3));
    }

    #[test]
    fn edge_names_follow_the_string_contract() {
        assert_eq!("Rising".parse::<TriggerEdge>(), Ok(TriggerEdge::Rising));
        assert_eq!("Falling".parse::<TriggerEdge>(), Ok(TriggerEdge::Falling));
        assert!("rising".parse::<TriggerEdge>().is_err());
    }

    #[test]
    fn trigger_edge_on_missing_channel_is_rejected() {
        let mut board = open_board();
        assert_eq!(
            board.set_trigger_edge(8, TriggerEdge::Rising),
            Err(DigitizerError::ChannelOutOfRange { channel: 8, count: 8 })
        );
        assert_eq!(board.last_status(), CommandStatus::UNSUPPORTED);
        assert!(board.transport().writes().is_empty());
    }

    #[test]
    fn channel_operations_on_a_never_opened_board_are_not_attempted() {
        let mut board = closed_board();
        assert_eq!(
            board.set_trigger_edge(3, TriggerEdge::Rising),
            Err(DigitizerError::LinkNotOpen)
        );
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert_eq!(board.enable_auto_trigger(0x01), Err(DigitizerError::LinkNotOpen));
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert_eq!(board.disable_auto_trigger(0x01), Err(DigitizerError::LinkNotOpen));
        assert_eq!(
            board.set_trigger_coincidence(true, 16),
            Err(DigitizerError::LinkNotOpen)
        );
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert_eq!(board.transport().call_count(), 0);
    }
}
