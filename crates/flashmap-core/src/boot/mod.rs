//! Image header parsing and the boot handoff

pub mod handoff;
pub mod header;

pub use handoff::{
    boot_or_park, bring_up_or_halt, BootHandoff, BootPlatform, BootResponse, BootState, Resources,
    CONSOLE_FLUSH_TIMEOUT_MS,
};
pub use header::{ImageHeader, ImageVersion, IMAGE_HEADER_PREFIX_SIZE, IMAGE_MAGIC};
