//! flashmap-sim - In-memory flash and platform simulators for testing
//!
//! This crate emulates the hardware underneath flashmap-core so the flash
//! area layer and the boot handoff can be exercised without a board:
//!
//! - [`SimRowFlash`] - row-granular on-chip flash that erases to 0x00
//! - [`SimQspi`] - QSPI controller with an SPI25/SFDP serial NOR part and
//!   an XIP window
//! - [`SimPlatform`] - records what the boot handoff does

mod platform;
mod qspi;
mod row;

pub use platform::{PlatformEvent, SimPlatform};
pub use qspi::{SimQspi, SimQspiConfig};
pub use row::{SimRowFlash, SimRowFlashConfig};

use flashmap_core::board::BoardLayout;
use flashmap_core::driver::{ExternalFlash, InternalFlash};
use flashmap_core::{FlashMap, Registry, Result};

/// On-chip flash and probed serial flash matching a board layout
pub fn board_devices(
    board: &BoardLayout<'_>,
) -> Result<(InternalFlash<SimRowFlash>, ExternalFlash<SimQspi>)> {
    let rows = SimRowFlash::new(SimRowFlashConfig {
        base: board.internal.base,
        size: board.internal.size,
        row_size: board.internal.erase_size,
    });
    let qspi = SimQspi::new(SimQspiConfig {
        size: board.external.size,
        sector_size: board.external.erase_size,
        memory_base: board.external.base,
        ..SimQspiConfig::default()
    });
    Ok((InternalFlash::new(rows), ExternalFlash::probe(qspi)?))
}

/// Simulated flash map over `registry`, with devices shaped like `board`
pub fn flash_map<'r>(
    registry: &'r Registry,
    board: &BoardLayout<'_>,
) -> Result<FlashMap<'r, SimRowFlash, SimQspi>> {
    let (internal, external) = board_devices(board)?;
    Ok(FlashMap::new(registry, internal, external))
}
