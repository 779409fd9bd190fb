use crate::registers::{self, acq_control, channel_config, zle};
use crate::{BoardConnection, BusTransport, DigitizerError, Result};
use log::{info, warn};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Started and stopped by register writes.
    Software,
    /// Gated by the front panel S-IN input.
    SIn,
}

impl AcquisitionMode {
    pub fn code(self) -> u32 {
        match self {
            Self::Software => acq_control::SW_CONTROLLED,
            Self::SIn => acq_control::S_IN_CONTROLLED,
        }
    }
}

impl FromStr for AcquisitionMode {
    type Err = DigitizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Software" => Ok(Self::Software),
            "SIn" => Ok(Self::SIn),
            other => Err(DigitizerError::Unsupported {
                parameter: "acquisition mode (select 'Software' or 'SIn')",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Software => "Software",
            Self::SIn => "SIn",
        })
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZeroSuppressionMode {
    None,
    #[serde(rename = "ZLE")]
    Zle,
}

impl ZeroSuppressionMode {
    pub fn code(self) -> u32 {
        match self {
            Self::None => channel_config::ZS_NONE,
            Self::Zle => channel_config::ZS_ZLE,
        }
    }
}

impl FromStr for ZeroSuppressionMode {
    type Err = DigitizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "None" => Ok(Self::None),
            "ZLE" => Ok(Self::Zle),
            other => Err(DigitizerError::Unsupported {
                parameter: "zero suppression mode (select 'None' or 'ZLE')",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ZeroSuppressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "None",
            Self::Zle => "ZLE",
        })
    }
}

/// Zero-length-encoding parameters of one channel.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZleChannelSettings {
    pub channel: u32,
    /// Threshold in ADC counts.
    pub threshold: u32,
    /// Samples kept before the threshold crossing.
    pub samples_before: u32,
    /// Samples kept after the signal returns below threshold.
    pub samples_after: u32,
    /// Keep samples above the threshold (true) or below it (false).
    pub positive_logic: bool,
}

impl ZleChannelSettings {
    /// (threshold register, sample window register)
    fn encode(&self) -> (u32, u32) {
        let logic = if self.positive_logic {
            0
        } else {
            zle::NEGATIVE_LOGIC
        };
        let threshold = logic | (self.threshold & zle::THRESHOLD_MASK);
        let window = (self.samples_before << zle::SAMPLES_BEFORE_SHIFT)
            | (self.samples_after & zle::MAX_SAMPLES);
        (threshold, window)
    }
}

impl<T: BusTransport> BoardConnection<T> {
    pub fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<()> {
        let result = self
            .modify(registers::ACQ_CONTROL, |value| {
                (value & !acq_control::MODE_MASK) | mode.code()
            })
            .map(|_| info!("Board {}: acquisition mode {}", self.board_id(), mode));
        self.record(result)
    }

    pub fn set_zs_mode(&mut self, mode: ZeroSuppressionMode) -> Result<()> {
        let result = self
            .modify(registers::BROADCAST_CH_CONFIG, |value| {
                (value & !channel_config::ZS_MASK) | (mode.code() << channel_config::ZS_SHIFT)
            })
            .map(|_| info!("Board {}: zero suppression {}", self.board_id(), mode));
        self.record(result)
    }

    /// Writes the ZLE threshold and sample window of one channel.
    ///
    /// The threshold must fit the ADC range discovered at link open, and both
    /// sample counts must fit their 16-bit fields.
    pub fn set_zle_channel_settings(&mut self, settings: &ZleChannelSettings) -> Result<()> {
        let result = self.write_zle_settings(settings);
        self.record(result)
    }

    fn write_zle_settings(&mut self, settings: &ZleChannelSettings) -> Result<()> {
        self.check_channel(settings.channel)?;
        let max_code = self.topology().max_code.min(zle::THRESHOLD_MASK);
        if settings.threshold > max_code {
            return Err(DigitizerError::ValueOutOfRange {
                parameter: "ZLE threshold",
                value: settings.threshold,
                max: max_code,
            });
        }
        for (parameter, value) in [
            ("ZLE samples before", settings.samples_before),
            ("ZLE samples after", settings.samples_after),
        ] {
            if value > zle::MAX_SAMPLES {
                return Err(DigitizerError::ValueOutOfRange {
                    parameter,
                    value,
                    max: zle::MAX_SAMPLES,
                });
            }
        }

        let (threshold, window) = settings.encode();
        let channel = settings.channel;
        self.write(
            registers::channel_register(registers::CHANNEL_ZS_THRESHOLD_BASE, channel),
            threshold,
        )?;
        self.write(
            registers::channel_register(registers::CHANNEL_ZS_NSAMPLE_BASE, channel),
            window,
        )
    }

    /// Puts the board in its baseline state.
    ///
    /// The writes are issued in order and the sequence stops at the first
    /// failure, which is returned.
    pub fn initialize(&mut self) -> Result<()> {
        let result = self.write_baseline();
        if let Err(ref e) = result {
            warn!("Board {}: initialization aborted: {}", self.board_id(), e);
        }
        self.record(result)
    }

    fn write_baseline(&mut self) -> Result<()> {
        const BASELINE: [(u32, u32); 6] = [
            (registers::SW_RESET, 0x0000_0000),
            (registers::VME_CONTROL, registers::VME_CONTROL_BERR),
            (registers::FRONT_PANEL_IO_CTRL, 0x0000_0000),
            (registers::TRIGGER_SRC_ENABLE, registers::TRIGGER_SRC_BASELINE),
            (registers::FP_TRIGGER_OUT_ENABLE, 0x0000_0000),
            (registers::BROADCAST_CH_CONFIG, registers::CH_CONFIG_BASELINE),
        ];
        for (address, value) in BASELINE {
            self.write(address, value)?;
        }
        info!("Board {}: initialized", self.board_id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::{closed_board, open_board, open_board_with};
    use crate::{CommandStatus, DgtzReturn, SimulatedTransport};

    #[test]
    fn acquisition_mode_keeps_other_control_bits() {
        let sim = SimulatedTransport::default()
            .with_register(registers::ACQ_CONTROL, 0x0000_0009);
        let mut board = open_board_with(sim);
        board.set_acquisition_mode(AcquisitionMode::Software).unwrap();
        assert_eq!(board.transport().peek(registers::ACQ_CONTROL), 0x0000_0008);
        board.set_acquisition_mode(AcquisitionMode::SIn).unwrap();
        assert_eq!(board.transport().peek(registers::ACQ_CONTROL), 0x0000_0009);
    }

    #[test]
    fn unsupported_acquisition_mode_is_named() {
        let mut board = open_board();
        let parsed = board.parse_setting::<AcquisitionMode>("FirstTrigger");
        assert!(parsed.is_err());
        assert_eq!(board.last_status(), CommandStatus::UNSUPPORTED);
        assert!(board.transport().writes().is_empty());
    }

    #[test]
    fn zs_mode_sets_bits_16_to_19() {
        let sim = SimulatedTransport::default()
            .with_register(registers::BROADCAST_CH_CONFIG, 0x0000_0050);
        let mut board = open_board_with(sim);
        board.set_zs_mode(ZeroSuppressionMode::Zle).unwrap();
        assert_eq!(board.transport().peek(registers::BROADCAST_CH_CONFIG), 0x0002_0050);
        board.set_zs_mode(ZeroSuppressionMode::None).unwrap();
        assert_eq!(board.transport().peek(registers::BROADCAST_CH_CONFIG), 0x0000_0050);
        assert!("zle".parse::<ZeroSuppressionMode>().is_err());
    }

    #[test]
    fn zle_settings_land_in_channel_registers() {
        let mut board = open_board();
        board
            .set_zle_channel_settings(&ZleChannelSettings {
                channel: 2,
                threshold: 2100,
                samples_before: 20,
                samples_after: 40,
                positive_logic: false,
            })
            .unwrap();
        assert_eq!(board.transport().peek(0x1224), 0x8000_0834);
        assert_eq!(board.transport().peek(0x1228), 0x0014_0028);
    }

    #[test]
    fn zle_threshold_beyond_adc_range_is_rejected() {
        let mut board = open_board();
        let settings = ZleChannelSettings {
            channel: 0,
            threshold: 4096,
            samples_before: 0,
            samples_after: 0,
            positive_logic: true,
        };
        assert!(matches!(
            board.set_zle_channel_settings(&settings),
            Err(DigitizerError::ValueOutOfRange { max: 4095, .. })
        ));
        assert!(board.transport().writes().is_empty());
    }

    #[test]
    fn zle_on_missing_channel_is_rejected() {
        let mut board = open_board();
        let settings = ZleChannelSettings {
            channel: 12,
            threshold: 100,
            samples_before: 1,
            samples_after: 1,
            positive_logic: true,
        };
        assert_eq!(
            board.set_zle_channel_settings(&settings),
            Err(DigitizerError::ChannelOutOfRange { channel: 12, count: 8 })
        );
    }

    #[test]
    fn initialize_writes_the_baseline_in_order() {
        let mut board = open_board();
        board.initialize().unwrap();
        assert_eq!(
            board.transport().writes(),
            &[
                (0xEF24, 0x0000_0000),
                (0xEF00, 0x0000_0010),
                (0x811C, 0x0000_0000),
                (0x810C, 0xC000_0080),
                (0x8110, 0x0000_0000),
                (0x8000, 0x0000_0050),
            ]
        );
        assert!(board.last_status().is_success());
    }

    #[test]
    fn initialize_stops_at_first_failure() {
        let mut board = open_board();
        board.transport_mut().fail_next(DgtzReturn::WriteDeviceRegisterFail);
        assert_eq!(
            board.initialize(),
            Err(DigitizerError::Transport(DgtzReturn::WriteDeviceRegisterFail))
        );
        assert_eq!(board.transport().call_count(), 1);
        assert_eq!(board.last_status().code(), -11);
    }

    #[test]
    fn zle_on_a_never_opened_board_is_not_attempted() {
        let mut board = closed_board();
        let settings = ZleChannelSettings {
            channel: 0,
            threshold: 100,
            samples_before: 1,
            samples_after: 1,
            positive_logic: true,
        };
        assert_eq!(
            board.set_zle_channel_settings(&settings),
            Err(DigitizerError::LinkNotOpen)
        );
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert_eq!(board.transport().call_count(), 0);
    }
}
