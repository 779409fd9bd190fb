//! Register map of the V1720-family waveform digitizers.
//!
//! Control registers are global. Per-channel registers live in blocks of
//! `CHANNEL_STRIDE` bytes starting at the family base address, so the
//! register of channel `n` sits at `base + n * CHANNEL_STRIDE`.

// ========== Control registers ==========

/// Broadcast channel configuration (written to every channel at once).
pub const BROADCAST_CH_CONFIG: u32 = 0x8000;
/// Acquisition control. [1:0] start mode.
pub const ACQ_CONTROL: u32 = 0x8100;
/// Global trigger source enable mask.
pub const TRIGGER_SRC_ENABLE: u32 = 0x810C;
/// Front panel TRG-OUT enable mask. Same bit layout as `TRIGGER_SRC_ENABLE`, no level field.
pub const FP_TRIGGER_OUT_ENABLE: u32 = 0x8110;
/// Front panel I/O control. [0] 0 = NIM, 1 = TTL.
pub const FRONT_PANEL_IO_CTRL: u32 = 0x811C;
/// Channel enable mask. [7:0] one bit per channel.
pub const CHANNEL_ENABLE_MASK: u32 = 0x8120;
/// Number of events stored in the board memory.
pub const EVENT_STORED: u32 = 0x812C;
/// VME control. [4] bus error enable.
pub const VME_CONTROL: u32 = 0xEF00;
/// Any write resets the board logic.
pub const SW_RESET: u32 = 0xEF24;

// ========== Per-channel register families ==========

pub const CHANNEL_STRIDE: u32 = 0x0100;

/// ZLE threshold. [11:0] threshold, [31] logic.
pub const CHANNEL_ZS_THRESHOLD_BASE: u32 = 0x1024;
/// ZLE sample window. [31:16] samples before, [15:0] samples after.
pub const CHANNEL_ZS_NSAMPLE_BASE: u32 = 0x1028;
/// Channel trigger control. [16] polarity.
pub const CHANNEL_TRIGGER_CTRL_BASE: u32 = 0x1080;
/// Channel status (read only).
pub const CHANNEL_STATUS_BASE: u32 = 0x1088;

/// Address of `channel`'s register in the family starting at `base`.
pub fn channel_register(base: u32, channel: u32) -> u32 {
    base + CHANNEL_STRIDE * channel
}

// ========== Bit layouts ==========

pub mod trigger_src {
    /// [7:0] per-channel self-trigger enables.
    pub const CHANNEL_MASK: u32 = 0x0000_00FF;
    pub const COINCIDENCE_SHIFT: u32 = 24;
    /// [27:24] coincidence level.
    pub const COINCIDENCE_MASK: u32 = 0x0F00_0000;
    pub const COINCIDENCE_MAX: u32 = 0xF;
    pub const EXTERNAL: u32 = 1 << 30;
    pub const SOFTWARE: u32 = 1 << 31;
}

pub mod front_panel {
    /// Set selects TTL levels, clear selects NIM.
    pub const TTL: u32 = 1 << 0;
}

pub mod acq_control {
    pub const MODE_MASK: u32 = 0b11;
    pub const SW_CONTROLLED: u32 = 0b00;
    pub const S_IN_CONTROLLED: u32 = 0b01;
}

pub mod channel_config {
    pub const ZS_SHIFT: u32 = 16;
    /// [19:16] zero suppression algorithm.
    pub const ZS_MASK: u32 = 0x000F_0000;
    pub const ZS_NONE: u32 = 0x0;
    pub const ZS_ZLE: u32 = 0x2;
}

pub mod channel_trigger {
    /// Clear triggers on the rising edge, set on the falling edge.
    pub const POLARITY_FALLING: u32 = 1 << 16;
}

pub mod zle {
    pub const THRESHOLD_MASK: u32 = 0x0000_0FFF;
    /// Set selects negative logic.
    pub const NEGATIVE_LOGIC: u32 = 1 << 31;
    pub const SAMPLES_BEFORE_SHIFT: u32 = 16;
    pub const MAX_SAMPLES: u32 = 0xFFFF;
}

pub mod channel_status {
    pub const MEMORY_FULL: u32 = 1 << 0;
    pub const MEMORY_EMPTY: u32 = 1 << 1;
    pub const DAC_BUSY: u32 = 1 << 2;
    pub const BUFFER_FREE_ERROR: u32 = 1 << 5;
}

// ========== Baseline written by `initialize` ==========

pub const VME_CONTROL_BERR: u32 = 0x0000_0010;
/// Software and external trigger plus channel 7 self-trigger.
pub const TRIGGER_SRC_BASELINE: u32 = 0xC000_0080;
/// Sequential memory access and falling-edge trigger on every channel.
pub const CH_CONFIG_BASELINE: u32 = 0x0000_0050;
