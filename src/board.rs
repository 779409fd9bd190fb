//! Board connection: link lifecycle and raw register access.
//!
//! A [`BoardConnection`] owns the transport, the session handle and the
//! channel topology of one physical board. The handle exists exactly while
//! the link is open, so every register access checks for it first.

use crate::{
    BoardHandle, BusTransport, CommandStatus, ConnectionKind, DigitizerError, Result,
};
use log::{debug, error, info, trace, warn};
use serde::Deserialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Board models driven by this crate.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BoardModel {
    #[default]
    V1720,
    V1724,
    DT5720,
}

impl fmt::Display for BoardModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::V1720 => "V1720",
            Self::V1724 => "V1724",
            Self::DT5720 => "DT5720",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Open,
}

/// Channel layout discovered when the link opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelTopology {
    pub channel_count: u32,
    pub adc_bits: u32,
    pub min_code: u32,
    pub max_code: u32,
}

impl ChannelTopology {
    pub fn new(channel_count: u32, adc_bits: u32) -> Self {
        let max_code = match adc_bits {
            0 => 0,
            bits if bits >= 32 => u32::MAX,
            bits => (1u32 << bits) - 1,
        };
        Self {
            channel_count,
            adc_bits,
            min_code: 0,
            max_code,
        }
    }

    /// Mask with one bit set per existing channel.
    pub fn channel_mask(&self) -> u32 {
        if self.channel_count >= 32 {
            u32::MAX
        } else {
            (1u32 << self.channel_count) - 1
        }
    }
}

/// Identification snapshot taken at link open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardIdentity {
    pub model_name: String,
    pub channels: u32,
    pub roc_firmware: String,
    pub amc_firmware: String,
    pub adc_bits: u32,
    pub serial_number: u32,
    pub address: u32,
    pub board_id: i32,
    pub handle: BoardHandle,
}

impl fmt::Display for BoardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board         : {}", self.model_name)?;
        writeln!(f, "Channels      : {}", self.channels)?;
        writeln!(f, "ROC FW        : {}", self.roc_firmware)?;
        writeln!(f, "AMC FW        : {}", self.amc_firmware)?;
        writeln!(f, "ADC bits      : {}", self.adc_bits)?;
        writeln!(f, "Serial #      : {}", self.serial_number)?;
        writeln!(f, "Board address : 0x{:08X}", self.address)?;
        writeln!(f, "Board ID      : {}", self.board_id)?;
        write!(f, "Board handle  : {}", self.handle)
    }
}

/// Guard consulted before every register write.
pub trait WritePolicy: fmt::Debug + Send {
    fn allows(&self, address: u32) -> bool;
}

/// Allows every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct Permissive;

impl WritePolicy for Permissive {
    fn allows(&self, _address: u32) -> bool {
        true
    }
}

/// Rejects writes into any of the listed address ranges.
#[derive(Debug, Default, Clone)]
pub struct ProtectedRanges {
    ranges: Vec<RangeInclusive<u32>>,
}

impl ProtectedRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protect(mut self, range: RangeInclusive<u32>) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn protect_register(self, address: u32) -> Self {
        self.protect(address..=address)
    }
}

impl WritePolicy for ProtectedRanges {
    fn allows(&self, address: u32) -> bool {
        !self.ranges.iter().any(|range| range.contains(&address))
    }
}

/// Connection parameters passed to the transport at open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkParams {
    pub kind: ConnectionKind,
    pub device_index: u32,
    pub link_number: u32,
}

/// One physical digitizer board.
///
/// Dropping the connection does not close the link; call [`close_link`](Self::close_link).
#[derive(Debug)]
pub struct BoardConnection<T: BusTransport> {
    model: BoardModel,
    board_id: i32,
    address: u32,
    link: LinkParams,
    transport: T,
    handle: Option<BoardHandle>,
    topology: ChannelTopology,
    identity: Option<BoardIdentity>,
    last_status: CommandStatus,
    write_policy: Box<dyn WritePolicy>,
}

impl<T: BusTransport> BoardConnection<T> {
    pub fn new(transport: T, model: BoardModel, board_id: i32, address: u32) -> Self {
        Self {
            model,
            board_id,
            address,
            link: LinkParams::default(),
            transport,
            handle: None,
            topology: ChannelTopology::default(),
            identity: None,
            last_status: CommandStatus::SUCCESS,
            write_policy: Box::new(Permissive),
        }
    }

    pub fn with_link(mut self, link: LinkParams) -> Self {
        self.link = link;
        self
    }

    pub fn with_write_policy(mut self, policy: impl WritePolicy + 'static) -> Self {
        self.write_policy = Box::new(policy);
        self
    }

    pub fn model(&self) -> BoardModel {
        self.model
    }

    pub fn board_id(&self) -> i32 {
        self.board_id
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn handle(&self) -> Option<BoardHandle> {
        self.handle
    }

    pub fn link_state(&self) -> LinkState {
        if self.handle.is_some() {
            LinkState::Open
        } else {
            LinkState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Topology from the most recent successful open; zeroed before the first one.
    pub fn topology(&self) -> &ChannelTopology {
        &self.topology
    }

    pub fn identity(&self) -> Option<&BoardIdentity> {
        self.identity.as_ref()
    }

    pub fn last_status(&self) -> CommandStatus {
        self.last_status
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn open_link(&mut self) -> Result<()> {
        let result = self.establish_link();
        self.record(result)
    }

    fn establish_link(&mut self) -> Result<()> {
        if self.handle.is_some() {
            warn!("Board {}: link is already open", self.board_id);
            return Err(DigitizerError::LinkAlreadyOpen);
        }

        let handle = self
            .transport
            .open(
                self.link.kind,
                self.link.device_index,
                self.link.link_number,
                self.address,
            )
            .map_err(|e| {
                error!("Board {}: error opening link: {:?}", self.board_id, e);
                DigitizerError::from(e)
            })?;

        let board_info = match self.transport.board_info(handle) {
            Ok(info) => info,
            Err(e) => {
                error!("Board {}: board info query failed: {:?}", self.board_id, e);
                if let Err(close_err) = self.transport.close(handle) {
                    warn!(
                        "Board {}: closing half-open link failed: {:?}",
                        self.board_id, close_err
                    );
                }
                return Err(e.into());
            }
        };

        self.topology = ChannelTopology::new(board_info.channels, board_info.adc_bits);
        let identity = BoardIdentity {
            model_name: board_info.model_name,
            channels: board_info.channels,
            roc_firmware: board_info.roc_firmware,
            amc_firmware: board_info.amc_firmware,
            adc_bits: board_info.adc_bits,
            serial_number: board_info.serial_number,
            address: self.address,
            board_id: self.board_id,
            handle,
        };
        info!("Link successfully established!\n{}", identity);
        self.identity = Some(identity);
        self.handle = Some(handle);
        Ok(())
    }

    pub fn close_link(&mut self) -> Result<()> {
        let result = self.teardown_link();
        self.record(result)
    }

    fn teardown_link(&mut self) -> Result<()> {
        let handle = self.handle.ok_or_else(|| {
            warn!("Board {}: link is already closed", self.board_id);
            DigitizerError::LinkNotOpen
        })?;
        self.transport.close(handle).map_err(|e| {
            error!("Board {}: error closing link: {:?}", self.board_id, e);
            DigitizerError::from(e)
        })?;
        self.handle = None;
        info!("Board {}: link successfully closed", self.board_id);
        Ok(())
    }

    pub fn set_register(&mut self, address: u32, value: u32) -> Result<()> {
        let result = self.write(address, value);
        self.record(result)
    }

    pub fn get_register(&mut self, address: u32) -> Result<u32> {
        let result = self.read(address);
        self.record(result)
    }

    pub fn check_register_for_writing(&self, address: u32) -> bool {
        self.write_policy.allows(address)
    }

    /// Parses a configuration name, recording an unsupported status when it is not recognised.
    pub fn parse_setting<S>(&mut self, name: &str) -> Result<S>
    where
        S: FromStr<Err = DigitizerError>,
    {
        let result = name.parse::<S>();
        if let Err(ref e) = result {
            warn!("Board {}: {}", self.board_id, e);
        }
        self.record(result)
    }

    pub(crate) fn record<R>(&mut self, result: Result<R>) -> Result<R> {
        self.last_status = match &result {
            Ok(_) => CommandStatus::SUCCESS,
            Err(e) => e.status(),
        };
        result
    }

    pub(crate) fn write(&mut self, address: u32, value: u32) -> Result<()> {
        let handle = self.ensure_open()?;
        if !self.write_policy.allows(address) {
            warn!(
                "Board {}: write to protected register 0x{:04X} refused",
                self.board_id, address
            );
            return Err(DigitizerError::ProtectedRegister { address });
        }
        trace!("Board {}: write 0x{:04X} <- 0x{:08X}", self.board_id, address, value);
        self.transport
            .write_register(handle, address, value)
            .map_err(|e| {
                error!(
                    "Board {}: write 0x{:04X} failed: {:?}",
                    self.board_id, address, e
                );
                DigitizerError::from(e)
            })
    }

    pub(crate) fn read(&mut self, address: u32) -> Result<u32> {
        let handle = self.ensure_open()?;
        let value = self
            .transport
            .read_register(handle, address)
            .map_err(|e| {
                error!(
                    "Board {}: read 0x{:04X} failed: {:?}",
                    self.board_id, address, e
                );
                DigitizerError::from(e)
            })?;
        trace!("Board {}: read 0x{:04X} -> 0x{:08X}", self.board_id, address, value);
        Ok(value)
    }

    /// Read-modify-write; returns the value written.
    pub(crate) fn modify(&mut self, address: u32, f: impl FnOnce(u32) -> u32) -> Result<u32> {
        let old = self.read(address)?;
        let new = f(old);
        debug!(
            "Board {}: 0x{:04X}: 0x{:08X} -> 0x{:08X}",
            self.board_id, address, old, new
        );
        self.write(address, new)?;
        Ok(new)
    }

    /// Handle of the open link. Comes before any argument validation, since
    /// the topology is only meaningful while the link is open.
    pub(crate) fn ensure_open(&self) -> Result<BoardHandle> {
        self.handle.ok_or(DigitizerError::LinkNotOpen)
    }

    pub(crate) fn check_channel(&self, channel: u32) -> Result<()> {
        self.ensure_open()?;
        if channel < self.topology.channel_count {
            Ok(())
        } else {
            Err(DigitizerError::ChannelOutOfRange {
                channel,
                count: self.topology.channel_count,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{BoardInfo, DgtzReturn, SimulatedTransport};

    pub(crate) fn open_board() -> BoardConnection<SimulatedTransport> {
        open_board_with(SimulatedTransport::default())
    }

    /// Board that has never been opened, so its topology is still zeroed.
    pub(crate) fn closed_board() -> BoardConnection<SimulatedTransport> {
        BoardConnection::new(SimulatedTransport::default(), BoardModel::V1720, 0, 0)
    }

    pub(crate) fn open_board_with(
        sim: SimulatedTransport,
    ) -> BoardConnection<SimulatedTransport> {
        let mut board = BoardConnection::new(sim, BoardModel::V1720, 0, 0x3210_0000);
        board.open_link().unwrap();
        board.transport_mut().clear_log();
        board
    }

    #[test]
    fn open_close_open_cycles_state() {
        let mut board =
            BoardConnection::new(SimulatedTransport::default(), BoardModel::V1720, 1, 0);
        assert_eq!(board.link_state(), LinkState::Closed);
        board.open_link().unwrap();
        assert_eq!(board.link_state(), LinkState::Open);
        board.close_link().unwrap();
        assert_eq!(board.link_state(), LinkState::Closed);
        board.open_link().unwrap();
        assert_eq!(board.link_state(), LinkState::Open);
        assert!(board.last_status().is_success());
    }

    #[test]
    fn opening_an_open_link_touches_nothing() {
        let mut board = open_board();
        let handle = board.handle();
        assert_eq!(board.open_link(), Err(DigitizerError::LinkAlreadyOpen));
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert_eq!(board.transport().call_count(), 0);
        assert_eq!(board.handle(), handle);
    }

    #[test]
    fn closing_a_closed_link_touches_nothing() {
        let mut board =
            BoardConnection::new(SimulatedTransport::default(), BoardModel::V1720, 0, 0);
        assert_eq!(board.close_link(), Err(DigitizerError::LinkNotOpen));
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert_eq!(board.transport().call_count(), 0);
    }

    #[test]
    fn open_populates_topology_and_identity() {
        let sim = SimulatedTransport::new(BoardInfo {
            model_name: "V1724".into(),
            channels: 8,
            adc_bits: 14,
            roc_firmware: "04.06".into(),
            amc_firmware: "00.07".into(),
            serial_number: 77,
        });
        let mut board = BoardConnection::new(sim, BoardModel::V1724, 2, 0x1100_0000);
        assert_eq!(*board.topology(), ChannelTopology::default());
        board.open_link().unwrap();

        let topology = *board.topology();
        assert_eq!(topology.channel_count, 8);
        assert_eq!(topology.min_code, 0);
        assert_eq!(topology.max_code, 16383);

        let identity = board.identity().unwrap();
        assert_eq!(identity.serial_number, 77);
        assert_eq!(identity.address, 0x1100_0000);
        assert_eq!(Some(identity.handle), board.handle());

        board.close_link().unwrap();
        assert_eq!(board.topology().channel_count, 8);
    }

    #[test]
    fn failed_open_stays_closed_with_transport_code() {
        let mut sim = SimulatedTransport::default();
        sim.fail_next(DgtzReturn::DigitizerNotFound);
        let mut board = BoardConnection::new(sim, BoardModel::V1720, 0, 0);
        assert_eq!(
            board.open_link(),
            Err(DigitizerError::Transport(DgtzReturn::DigitizerNotFound))
        );
        assert_eq!(board.link_state(), LinkState::Closed);
        assert_eq!(board.last_status().code(), -24);
    }

    #[test]
    fn failed_close_keeps_link_open() {
        let mut board = open_board();
        board.transport_mut().fail_next(DgtzReturn::CommError);
        assert!(board.close_link().is_err());
        assert!(board.is_open());
        assert_eq!(board.last_status().code(), -1);
    }

    #[test]
    fn register_round_trip() {
        let mut board = open_board();
        board.set_register(0x8120, 0xDEAD_BEEF).unwrap();
        assert_eq!(board.get_register(0x8120), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn register_access_needs_open_link() {
        let mut board =
            BoardConnection::new(SimulatedTransport::default(), BoardModel::V1720, 0, 0);
        assert_eq!(board.get_register(0x8120), Err(DigitizerError::LinkNotOpen));
        assert_eq!(board.transport().call_count(), 0);
    }

    #[test]
    fn channel_checks_wait_for_the_link() {
        let mut board =
            BoardConnection::new(SimulatedTransport::default(), BoardModel::V1720, 0, 0);
        assert_eq!(board.check_channel(0), Err(DigitizerError::LinkNotOpen));
        board.open_link().unwrap();
        assert_eq!(board.check_channel(7), Ok(()));
        board.close_link().unwrap();
        assert_eq!(board.check_channel(7), Err(DigitizerError::LinkNotOpen));
    }

    #[test]
    fn protected_register_is_not_written() {
        let sim = SimulatedTransport::default();
        let mut board = BoardConnection::new(sim, BoardModel::V1720, 0, 0)
            .with_write_policy(ProtectedRanges::new().protect(0xEF00..=0xEFFF));
        board.open_link().unwrap();
        assert!(!board.check_register_for_writing(0xEF24));
        assert!(board.check_register_for_writing(0x8120));
        assert_eq!(
            board.set_register(0xEF24, 0),
            Err(DigitizerError::ProtectedRegister { address: 0xEF24 })
        );
        assert_eq!(board.last_status(), CommandStatus::NOT_ATTEMPTED);
        assert!(board.transport().writes().is_empty());
    }

    #[test]
    fn transport_failure_is_reported_verbatim() {
        let mut board = open_board();
        board.transport_mut().fail_next(DgtzReturn::Unknown(-77));
        assert_eq!(
            board.set_register(0x8120, 1),
            Err(DigitizerError::Transport(DgtzReturn::Unknown(-77)))
        );
        assert_eq!(board.last_status().code(), -77);
    }

    #[test]
    fn topology_codes_follow_adc_bits() {
        assert_eq!(ChannelTopology::new(8, 12).max_code, 4095);
        assert_eq!(ChannelTopology::new(4, 32).max_code, u32::MAX);
        assert_eq!(ChannelTopology::new(8, 12).channel_mask(), 0xFF);
    }
}
