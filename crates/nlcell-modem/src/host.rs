//! Interfaces to the hardware around the modem.
//!
//! The driver does not implement any of these; a board support layer or a
//! test double provides them.

use nlcell_at::Port;

use crate::error::Result;

// ============================================================================
// Host Board
// ============================================================================

/// The host pin that holds a Skywire Nano in its serial bootloader.
pub const RECOVERY_PIN: &str = "IO5";

/// The board the modem is mounted on.
pub trait Host: Send {
    /// Drive a named host pin.
    fn write_pin(&mut self, name: &str, state: bool) -> Result<()>;

    /// Pulse the modem's reset line.
    fn reset(&mut self) -> Result<()>;
}

// ============================================================================
// Debug Probe
// ============================================================================

/// A debug probe attached to the modem's SWD port.
pub trait DebugProbe: Send {
    /// Trigger a firmware update through the probe's mailbox.
    ///
    /// Returns `false` if the modem did not accept the trigger.
    fn trigger_dfu(&mut self, auto_reboot: bool) -> Result<bool>;
}

// ============================================================================
// Chunked Transfer
// ============================================================================

/// The bulk transfer codec that carries update images over the kernel-log
/// channel.
pub trait ChunkedTransfer: Send {
    /// Bytes per packet.
    fn packet_size(&self) -> usize;

    /// Change the bytes per packet.
    fn set_packet_size(&mut self, size: usize);

    /// Push `data` across `channel`. Returns whether the device acknowledged
    /// every packet.
    fn transfer(&mut self, data: &[u8], channel: &mut dyn Port) -> Result<bool>;
}
