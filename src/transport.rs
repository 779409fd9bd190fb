use crate::{registers, DgtzReturn};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Physical link used to reach the board.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionKind {
    #[default]
    Usb,
    OpticalLink,
}

impl ConnectionKind {
    /// Link type code understood by the bus library.
    pub fn code(self) -> u32 {
        match self {
            Self::Usb => 0,
            Self::OpticalLink => 1,
        }
    }
}

/// Opaque session handle handed out by the bus library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoardHandle(pub i32);

impl fmt::Display for BoardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Board description returned by the information query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardInfo {
    pub model_name: String,
    pub channels: u32,
    pub adc_bits: u32,
    pub roc_firmware: String,
    pub amc_firmware: String,
    pub serial_number: u32,
}

/// Blocking register transport to one or more boards.
///
/// Every call is a full round trip; failures carry the library code unchanged.
pub trait BusTransport {
    fn open(
        &mut self,
        kind: ConnectionKind,
        device_index: u32,
        link_number: u32,
        address: u32,
    ) -> Result<BoardHandle, DgtzReturn>;

    fn close(&mut self, handle: BoardHandle) -> Result<(), DgtzReturn>;

    fn write_register(
        &mut self,
        handle: BoardHandle,
        address: u32,
        value: u32,
    ) -> Result<(), DgtzReturn>;

    fn read_register(&mut self, handle: BoardHandle, address: u32) -> Result<u32, DgtzReturn>;

    fn board_info(&mut self, handle: BoardHandle) -> Result<BoardInfo, DgtzReturn>;
}

/// In-memory stand-in for a board: a sparse register map behind the transport API.
///
/// Unwritten registers read as zero and a write to the software reset
/// register clears the map.
#[derive(Debug)]
pub struct SimulatedTransport {
    info: BoardInfo,
    registers: HashMap<u32, u32>,
    open_handles: HashSet<BoardHandle>,
    next_handle: i32,
    calls: usize,
    writes: Vec<(u32, u32)>,
    fail_next: Option<DgtzReturn>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(BoardInfo {
            model_name: "V1720".to_string(),
            channels: 8,
            adc_bits: 12,
            roc_firmware: "04.05 - Build 0B09".to_string(),
            amc_firmware: "00.04 - Build 0A15".to_string(),
            serial_number: 102,
        })
    }
}

impl SimulatedTransport {
    pub fn new(info: BoardInfo) -> Self {
        Self {
            info,
            registers: HashMap::new(),
            open_handles: HashSet::new(),
            next_handle: 0,
            calls: 0,
            writes: Vec::new(),
            fail_next: None,
        }
    }

    /// Presets a register without counting as a transport call.
    pub fn with_register(mut self, address: u32, value: u32) -> Self {
        self.registers.insert(address, value);
        self
    }

    pub fn set(&mut self, address: u32, value: u32) {
        self.registers.insert(address, value);
    }

    /// Current register content, read without going through the transport.
    pub fn peek(&self, address: u32) -> u32 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    /// Number of transport calls issued so far.
    pub fn call_count(&self) -> usize {
        self.calls
    }

    /// Every register write in issue order.
    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    pub fn clear_log(&mut self) {
        self.calls = 0;
        self.writes.clear();
    }

    /// Makes the next transport call fail with `status`.
    pub fn fail_next(&mut self, status: DgtzReturn) {
        self.fail_next = Some(status);
    }

    pub fn is_open(&self, handle: BoardHandle) -> bool {
        self.open_handles.contains(&handle)
    }

    fn begin_call(&mut self) -> Result<(), DgtzReturn> {
        self.calls += 1;
        match self.fail_next.take() {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn check_handle(&self, handle: BoardHandle) -> Result<(), DgtzReturn> {
        if self.open_handles.contains(&handle) {
            Ok(())
        } else {
            Err(DgtzReturn::InvalidHandle)
        }
    }
}

impl BusTransport for SimulatedTransport {
    fn open(
        &mut self,
        _kind: ConnectionKind,
        _device_index: u32,
        _link_number: u32,
        _address: u32,
    ) -> Result<BoardHandle, DgtzReturn> {
        self.begin_call()?;
        let handle = BoardHandle(self.next_handle);
        self.next_handle += 1;
        self.open_handles.insert(handle);
        Ok(handle)
    }

    fn close(&mut self, handle: BoardHandle) -> Result<(), DgtzReturn> {
        self.begin_call()?;
        if self.open_handles.remove(&handle) {
            Ok(())
        } else {
            Err(DgtzReturn::InvalidHandle)
        }
    }

    fn write_register(
        &mut self,
        handle: BoardHandle,
        address: u32,
        value: u32,
    ) -> Result<(), DgtzReturn> {
        self.begin_call()?;
        self.check_handle(handle)?;
        self.writes.push((address, value));
        if address == registers::SW_RESET {
            self.registers.clear();
        } else {
            self.registers.insert(address, value);
        }
        Ok(())
    }

    fn read_register(&mut self, handle: BoardHandle, address: u32) -> Result<u32, DgtzReturn> {
        self.begin_call()?;
        self.check_handle(handle)?;
        Ok(self.peek(address))
    }

    fn board_info(&mut self, handle: BoardHandle) -> Result<BoardInfo, DgtzReturn> {
        self.begin_call()?;
        self.check_handle(handle)?;
        Ok(self.info.clone())
    }
}
