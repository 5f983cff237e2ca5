//! Flash device adapters
//!
//! One adapter per physical device kind: the row-granular on-chip flash and
//! the page/sector-granular serial flash with its XIP window.

pub mod external;
pub mod internal;
#[cfg(feature = "pdl")]
pub mod pdl;

pub use external::{ExternalFlash, ExternalFlashInfo, ProgramGuard, XipMode, XipWindow};
pub use internal::{InternalFlash, RowFlash};
#[cfg(feature = "pdl")]
pub use pdl::Psoc6Flash;
