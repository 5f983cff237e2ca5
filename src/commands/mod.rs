//! CLI command implementations
//!
//! Every command works on a [`BoardConfig`](flashmap_core::config::BoardConfig);
//! commands that touch flash run against the `flashmap-sim` devices.

pub mod boot;
pub mod layout;
pub mod radio;
pub mod selftest;

use flashmap_core::area::AreaId;

/// Errors specific to the CLI commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Area name did not parse or is not on the board
    #[error("unknown area '{0}'")]
    UnknownArea(String),
    /// Radio slot is missing from the board
    #[error("radio slot {0} is not defined on this board")]
    MissingRadioSlot(AreaId),
    /// Blob larger than the sizes the slot layout can express
    #[error("{name} is too large ({len} bytes)")]
    BlobTooLarge {
        /// Which blob
        name: &'static str,
        /// Its length
        len: usize,
    },
    /// Read back data differs from what was written
    #[error("verify failed in {area} at offset 0x{offset:X}")]
    VerifyFailed {
        /// Area being checked
        area: AreaId,
        /// First mismatching offset
        offset: u32,
    },
}

/// Format a byte count with a binary unit
pub fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0x40000), "256 KiB");
        assert_eq!(format_size(0x200000), "2 MiB");
        assert_eq!(format_size(0x1C0000), "1792 KiB");
        assert_eq!(format_size(421_098), "421098 B");
    }
}
