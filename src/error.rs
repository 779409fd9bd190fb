//! Error taxonomy for board operations.

use crate::{CommandStatus, DgtzReturn};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DigitizerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigitizerError {
    #[error("link is already open")]
    LinkAlreadyOpen,

    #[error("link is not open")]
    LinkNotOpen,

    /// The coincidence operation only arms the level; clearing needs a direct register write.
    #[error("trigger coincidence can only be armed, not disabled")]
    CoincidenceNotEnabled,

    #[error("register 0x{address:08X} is protected against writing")]
    ProtectedRegister { address: u32 },

    #[error("bus transport failed: {0:?} (code {code})", code = .0.code())]
    Transport(DgtzReturn),

    #[error("unsupported {parameter} '{value}'")]
    Unsupported {
        parameter: &'static str,
        value: String,
    },

    #[error("channel {channel} out of range: board has {count} channels")]
    ChannelOutOfRange { channel: u32, count: u32 },

    #[error("{parameter} {value} out of range: maximum is {max}")]
    ValueOutOfRange {
        parameter: &'static str,
        value: u32,
        max: u32,
    },
}

impl DigitizerError {
    /// Status code recorded for this failure.
    pub fn status(&self) -> CommandStatus {
        match self {
            Self::LinkAlreadyOpen
            | Self::LinkNotOpen
            | Self::CoincidenceNotEnabled
            | Self::ProtectedRegister { .. } => CommandStatus::NOT_ATTEMPTED,
            Self::Transport(ret) => CommandStatus::from(*ret),
            Self::Unsupported { .. }
            | Self::ChannelOutOfRange { .. }
            | Self::ValueOutOfRange { .. } => CommandStatus::UNSUPPORTED,
        }
    }

    /// True when nothing was sent to the board because a precondition failed.
    pub fn is_precondition(&self) -> bool {
        self.status() == CommandStatus::NOT_ATTEMPTED
    }
}

impl From<DgtzReturn> for DigitizerError {
    fn from(value: DgtzReturn) -> Self {
        Self::Transport(value)
    }
}
