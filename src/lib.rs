//! Register-level control of V1720-family waveform digitizers.
//!
//! A [`BoardConnection`] drives one board through a [`BusTransport`]: the
//! link has to be opened before any register is touched, and every
//! operation records its outcome as a [`CommandStatus`].

mod acquisition;
mod board;
#[cfg(feature = "caen")]
mod caen;
mod config;
mod digitizer_params;
mod error;
mod readout;
pub mod registers;
mod status;
mod transport;
mod trigger;
mod utils;

pub use acquisition::*;
pub use board::*;
#[cfg(feature = "caen")]
pub use caen::*;
pub use config::*;
pub use digitizer_params::*;
pub use error::*;
pub use readout::*;
pub use status::*;
pub use transport::*;
pub use trigger::*;
pub use utils::*;
