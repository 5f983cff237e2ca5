//! Error types for flashmap-core
//!
//! A single no_std compatible error type is shared by the drivers, the
//! flash area layer, the slot mapper and the boot handoff.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Registry / mapping errors
    /// No flash area is registered under the requested id
    NotFound,
    /// The flash device id does not name a supported device
    UnsupportedDevice,
    /// The area id is not a primary or secondary slot of the image
    NotASlot,
    /// Image index is outside the number of managed images
    InvalidImageIndex,
    /// Board layout failed validation (overlap, bounds, duplicate ids)
    LayoutError,

    // Address/size errors
    /// Offset or length falls outside the flash area
    OutOfBounds,
    /// Offset or length is not a multiple of the device granularity
    InvalidAlignment,
    /// Provided buffer is too small for the operation
    BufferTooSmall,

    // Hardware errors
    /// Row or page program failed
    ProgramFailed {
        /// Absolute device address of the failed program
        addr: u32,
    },
    /// Row or sector erase failed
    EraseFailed {
        /// Absolute device address of the failed erase
        addr: u32,
    },
    /// Read operation failed
    ReadFailed,
    /// SPI transfer failed
    SpiTransferFailed,
    /// Serial flash did not answer with usable SFDP parameters
    ChipNotSupported,
    /// Controller rejected a command because it is in memory-mapped mode
    XipActive,
    /// Operation requires the memory-mapped (XIP) window
    XipInactive,

    // Image / boot errors
    /// Image header is malformed or points outside the address space
    InvalidImage,
    /// The boot handoff already happened in this boot cycle
    AlreadyBooted,
    /// Packed radio blobs do not fit in their slot
    LayoutTooLarge,
}

impl Error {
    /// Negative status code handed back to the image verification engine
    pub const fn status(&self) -> i32 {
        match self {
            Self::NotFound => -1,
            Self::UnsupportedDevice => -2,
            Self::NotASlot => -3,
            Self::InvalidImageIndex => -4,
            Self::LayoutError => -5,
            Self::OutOfBounds => -6,
            Self::InvalidAlignment => -7,
            Self::BufferTooSmall => -8,
            Self::ProgramFailed { .. } => -9,
            Self::EraseFailed { .. } => -10,
            Self::ReadFailed => -11,
            Self::SpiTransferFailed => -12,
            Self::ChipNotSupported => -13,
            Self::XipActive => -14,
            Self::XipInactive => -15,
            Self::InvalidImage => -16,
            Self::AlreadyBooted => -17,
            Self::LayoutTooLarge => -18,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "flash area not found"),
            Self::UnsupportedDevice => write!(f, "unsupported flash device"),
            Self::NotASlot => write!(f, "flash area is not an image slot"),
            Self::InvalidImageIndex => write!(f, "invalid image index"),
            Self::LayoutError => write!(f, "flash layout validation failed"),
            Self::OutOfBounds => write!(f, "offset out of flash area bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::ProgramFailed { addr } => {
                write!(f, "program failed at address 0x{:08X}", addr)
            }
            Self::EraseFailed { addr } => write!(f, "erase failed at address 0x{:08X}", addr),
            Self::ReadFailed => write!(f, "read operation failed"),
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::ChipNotSupported => write!(f, "serial flash not supported"),
            Self::XipActive => write!(f, "controller is in XIP mode"),
            Self::XipInactive => write!(f, "XIP mode is not active"),
            Self::InvalidImage => write!(f, "invalid image header"),
            Self::AlreadyBooted => write!(f, "boot handoff already performed"),
            Self::LayoutTooLarge => write!(f, "radio blobs exceed slot capacity"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_negative_and_distinct() {
        let all = [
            Error::NotFound,
            Error::UnsupportedDevice,
            Error::NotASlot,
            Error::InvalidImageIndex,
            Error::LayoutError,
            Error::OutOfBounds,
            Error::InvalidAlignment,
            Error::BufferTooSmall,
            Error::ProgramFailed { addr: 0 },
            Error::EraseFailed { addr: 0 },
            Error::ReadFailed,
            Error::SpiTransferFailed,
            Error::ChipNotSupported,
            Error::XipActive,
            Error::XipInactive,
            Error::InvalidImage,
            Error::AlreadyBooted,
            Error::LayoutTooLarge,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.status() < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.status(), b.status());
            }
        }
    }
}
