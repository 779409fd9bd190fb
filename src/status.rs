use std::fmt;

/// Return codes of the digitizer bus library.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DgtzReturn {
    Success,
    CommError,
    GenericError,
    InvalidParam,
    InvalidLinkType,
    InvalidHandle,
    MaxDevicesError,
    BadBoardType,
    BadInterruptLev,
    BadEventNumber,
    ReadDeviceRegisterFail,
    WriteDeviceRegisterFail,
    InvalidChannelNumber,
    ChannelBusy,
    FPIOModeInvalid,
    WrongAcqMode,
    FunctionNotAllowed,
    Timeout,
    InvalidBuffer,
    EventNotFound,
    InvalidEvent,
    OutOfMemory,
    CalibrationError,
    DigitizerNotFound,
    DigitizerAlreadyOpen,
    DigitizerNotReady,
    InterruptNotConfigured,
    DigitizerMemoryCorrupted,
    DPPFirmwareNotSupported,
    InvalidLicense,
    InvalidDigitizerStatus,
    UnsupportedTrace,
    InvalidProbe,
    UnsupportedBaseAddress,
    NotYetImplemented,
    Unknown(i32),
}

impl From<i32> for DgtzReturn {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Success,
            -1 => Self::CommError,
            -2 => Self::GenericError,
            -3 => Self::InvalidParam,
            -4 => Self::InvalidLinkType,
            -5 => Self::InvalidHandle,
            -6 => Self::MaxDevicesError,
            -7 => Self::BadBoardType,
            -8 => Self::BadInterruptLev,
            -9 => Self::BadEventNumber,
            -10 => Self::ReadDeviceRegisterFail,
            -11 => Self::WriteDeviceRegisterFail,
            -13 => Self::InvalidChannelNumber,
            -14 => Self::ChannelBusy,
            -15 => Self::FPIOModeInvalid,
            -16 => Self::WrongAcqMode,
            -17 => Self::FunctionNotAllowed,
            -18 => Self::Timeout,
            -19 => Self::InvalidBuffer,
            -20 => Self::EventNotFound,
            -21 => Self::InvalidEvent,
            -22 => Self::OutOfMemory,
            -23 => Self::CalibrationError,
            -24 => Self::DigitizerNotFound,
            -25 => Self::DigitizerAlreadyOpen,
            -26 => Self::DigitizerNotReady,
            -27 => Self::InterruptNotConfigured,
            -28 => Self::DigitizerMemoryCorrupted,
            -29 => Self::DPPFirmwareNotSupported,
            -30 => Self::InvalidLicense,
            -31 => Self::InvalidDigitizerStatus,
            -32 => Self::UnsupportedTrace,
            -33 => Self::InvalidProbe,
            -34 => Self::UnsupportedBaseAddress,
            -99 => Self::NotYetImplemented,
            other => Self::Unknown(other),
        }
    }
}

impl DgtzReturn {
    /// Raw library code, exactly as the bus library reported it.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::CommError => -1,
            Self::GenericError => -2,
            Self::InvalidParam => -3,
            Self::InvalidLinkType => -4,
            Self::InvalidHandle => -5,
            Self::MaxDevicesError => -6,
            Self::BadBoardType => -7,
            Self::BadInterruptLev => -8,
            Self::BadEventNumber => -9,
            Self::ReadDeviceRegisterFail => -10,
            Self::WriteDeviceRegisterFail => -11,
            Self::InvalidChannelNumber => -13,
            Self::ChannelBusy => -14,
            Self::FPIOModeInvalid => -15,
            Self::WrongAcqMode => -16,
            Self::FunctionNotAllowed => -17,
            Self::Timeout => -18,
            Self::InvalidBuffer => -19,
            Self::EventNotFound => -20,
            Self::InvalidEvent => -21,
            Self::OutOfMemory => -22,
            Self::CalibrationError => -23,
            Self::DigitizerNotFound => -24,
            Self::DigitizerAlreadyOpen => -25,
            Self::DigitizerNotReady => -26,
            Self::InterruptNotConfigured => -27,
            Self::DigitizerMemoryCorrupted => -28,
            Self::DPPFirmwareNotSupported => -29,
            Self::InvalidLicense => -30,
            Self::InvalidDigitizerStatus => -31,
            Self::UnsupportedTrace => -32,
            Self::InvalidProbe => -33,
            Self::UnsupportedBaseAddress => -34,
            Self::NotYetImplemented => -99,
            Self::Unknown(code) => code,
        }
    }

    /// Turns a library code into a `Result`, keeping failures verbatim.
    pub fn check(code: i32) -> Result<(), DgtzReturn> {
        match DgtzReturn::from(code) {
            DgtzReturn::Success => Ok(()),
            err => Err(err),
        }
    }
}

/// Outcome of the last operation issued on a board.
///
/// Zero is success, negative library codes are passed through unchanged, and
/// two sentinels outside the library's range mark operations that never
/// reached the bus.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CommandStatus(i32);

impl CommandStatus {
    pub const SUCCESS: Self = Self(0);
    /// A precondition failed (link state, write guard, disarmed coincidence); nothing was sent.
    pub const NOT_ATTEMPTED: Self = Self(-42);
    /// A configuration value was outside its accepted set; nothing was sent.
    pub const UNSUPPORTED: Self = Self(-43);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl Default for CommandStatus {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<DgtzReturn> for CommandStatus {
    fn from(value: DgtzReturn) -> Self {
        Self(value.code())
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NOT_ATTEMPTED => write!(f, "not attempted ({})", self.0),
            Self::UNSUPPORTED => write!(f, "unsupported parameter ({})", self.0),
            _ => write!(f, "{:?} ({})", DgtzReturn::from(self.0), self.0),
        }
    }
}
