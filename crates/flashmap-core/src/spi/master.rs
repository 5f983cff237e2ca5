//! Serial bus traits
//!
//! `SpiMaster` is the command path to the serial flash. `QspiController`
//! adds the memory-mapped (execute-in-place) window that the same
//! controller exposes once it is switched out of command mode.

use crate::error::Result;
use crate::spi::SpiCommand;
use bitflags::bitflags;

bitflags! {
    /// SPI master feature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiFeatures: u32 {
        /// Supports 4-byte addressing commands
        const FOUR_BYTE_ADDR = 1 << 0;
        /// Controller can map the device into the address space
        const XIP            = 1 << 8;
    }
}

impl Default for SpiFeatures {
    fn default() -> Self {
        SpiFeatures::empty()
    }
}

/// Blocking SPI master
///
/// This trait represents a controller that can execute single SPI
/// commands. Every call blocks until the transaction is finished on the bus.
pub trait SpiMaster {
    /// Get the features supported by this controller
    fn features(&self) -> SpiFeatures;

    /// Get the maximum number of bytes that can be read in a single transaction
    fn max_read_len(&self) -> usize;

    /// Get the maximum number of bytes that can be written in a single transaction
    fn max_write_len(&self) -> usize;

    /// Execute a single SPI command
    ///
    /// Controllers that are currently in memory-mapped mode must reject
    /// the command with `Error::XipActive`.
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Quad-SPI controller with a memory-mapped window
///
/// While memory mode is enabled the device contents are visible at
/// `memory_base() + device offset` and the command path is unavailable.
pub trait QspiController: SpiMaster {
    /// Switch between memory-mapped (XIP) mode and command mode
    fn set_memory_mode(&mut self, enabled: bool) -> Result<()>;

    /// Whether memory-mapped mode is currently enabled
    fn memory_mode(&self) -> bool;

    /// Base address of the memory-mapped window
    fn memory_base(&self) -> u32;

    /// Copy bytes out of the memory-mapped window
    ///
    /// `offset` is relative to the device start. Only valid in memory mode.
    fn read_mapped(&self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Release the bus pins and power the controller down
    ///
    /// Leaves memory mode; every later command fails.
    fn deinit(&mut self);
}
