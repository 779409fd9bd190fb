use crate::registers::{self, channel_status};
use crate::{BoardConnection, BusTransport, Result};
use log::debug;

/// Decoded channel status register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStatus {
    pub memory_full: bool,
    pub memory_empty: bool,
    pub dac_busy: bool,
    pub buffer_free_error: bool,
}

impl From<u32> for ChannelStatus {
    fn from(value: u32) -> Self {
        Self {
            memory_full: value & channel_status::MEMORY_FULL != 0,
            memory_empty: value & channel_status::MEMORY_EMPTY != 0,
            dac_busy: value & channel_status::DAC_BUSY != 0,
            buffer_free_error: value & channel_status::BUFFER_FREE_ERROR != 0,
        }
    }
}

impl<T: BusTransport> BoardConnection<T> {
    /// Bit `c` set means channel `c` is enabled.
    pub fn enabled_channel_mask(&mut self) -> Result<u32> {
        let result = self.read(registers::CHANNEL_ENABLE_MASK);
        self.record(result)
    }

    /// Buffer-full flag per channel.
    ///
    /// The enable mask is read once per call. Disabled channels are not
    /// polled and report `false`.
    pub fn check_buffer_status(&mut self) -> Result<Vec<bool>> {
        let result = self.poll_buffers();
        self.record(result)
    }

    fn poll_buffers(&mut self) -> Result<Vec<bool>> {
        let channels = self.topology().channel_count;
        let mut full = vec![false; channels as usize];
        let enabled = self.read(registers::CHANNEL_ENABLE_MASK)?;
        for (ch, flag) in (0..channels).zip(full.iter_mut()) {
            if ch >= 32 || enabled & (1 << ch) == 0 {
                continue;
            }
            let address = registers::channel_register(registers::CHANNEL_STATUS_BASE, ch);
            let status = self.read(address)?;
            *flag = status & channel_status::MEMORY_FULL != 0;
        }
        debug!("Board {}: buffer full flags {:?}", self.board_id(), full);
        Ok(full)
    }

    pub fn channel_status(&mut self, channel: u32) -> Result<ChannelStatus> {
        let result = self.check_channel(channel).and_then(|_| {
            self.read(registers::channel_register(registers::CHANNEL_STATUS_BASE, channel))
                .map(ChannelStatus::from)
        });
        self.record(result)
    }

    /// Events currently stored in the board memory.
    pub fn num_fpga_events(&mut self) -> Result<u32> {
        let result = self.read(registers::EVENT_STORED);
        self.record(result)
    }
}
