//! Flash area types
//!
//! A flash area is a named, fixed offset/size region on one of the two
//! flash devices. Areas are plain `Copy` values; the registry hands out
//! shared references to its immutable table.

use crate::error::{Error, Result};
use crate::slot::ImageIndex;

/// Raw device id of the on-chip flash, as seen by the verification engine
pub const DEVICE_ID_INTERNAL: u8 = 0x7F;
/// Flag bit marking an external device id
pub const DEVICE_ID_EXTERNAL_FLAG: u8 = 0x80;
/// Mask selecting the external device index from a raw id
pub const DEVICE_ID_INDEX_MASK: u8 = 0x7F;

/// The physical device a flash area lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashDevice {
    /// Memory-mapped on-chip flash, row granular
    Internal,
    /// Serial flash behind the QSPI controller, by controller slot index
    External(u8),
}

impl FlashDevice {
    /// Decode the engine's raw device id
    pub const fn from_raw(raw: u8) -> Result<Self> {
        if raw == DEVICE_ID_INTERNAL {
            Ok(Self::Internal)
        } else if raw & DEVICE_ID_EXTERNAL_FLAG != 0 {
            Ok(Self::External(raw & DEVICE_ID_INDEX_MASK))
        } else {
            Err(Error::UnsupportedDevice)
        }
    }

    /// Encode as the engine's raw device id
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Internal => DEVICE_ID_INTERNAL,
            Self::External(index) => DEVICE_ID_EXTERNAL_FLAG | (index & DEVICE_ID_INDEX_MASK),
        }
    }

    /// Value every byte reads back as after an erase
    ///
    /// The on-chip flash of this part erases to 0x00, not the usual 0xFF.
    pub const fn erased_value(self) -> u8 {
        match self {
            Self::Internal => 0x00,
            Self::External(_) => 0xFF,
        }
    }
}

impl core::fmt::Display for FlashDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::External(index) => write!(f, "external{}", index),
        }
    }
}

impl core::str::FromStr for FlashDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("internal") {
            return Ok(Self::Internal);
        }
        match s.strip_prefix("external") {
            Some("") => Ok(Self::External(0)),
            Some(n) => match n.parse::<u8>() {
                Ok(index) if index <= DEVICE_ID_INDEX_MASK => Ok(Self::External(index)),
                _ => Err(Error::UnsupportedDevice),
            },
            None => Err(Error::UnsupportedDevice),
        }
    }
}

/// Symbolic flash area identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaId {
    /// The bootloader itself
    Bootloader,
    /// Currently bootable slot of an image
    Primary(ImageIndex),
    /// Staged candidate slot of an image
    Secondary(ImageIndex),
    /// Swap scratch area shared by all images
    Scratch,
}

impl AreaId {
    /// Numeric id used by the verification engine
    ///
    /// Image 0 keeps the single-image numbering (1, 2), scratch sits at 3
    /// and further images continue after it.
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Bootloader => 0,
            Self::Primary(index) => match index.get() {
                0 => 1,
                n => 2 + 2 * n,
            },
            Self::Secondary(index) => match index.get() {
                0 => 2,
                n => 3 + 2 * n,
            },
            Self::Scratch => 3,
        }
    }

    /// Decode a numeric engine id
    pub const fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Bootloader),
            1 => Ok(Self::Primary(ImageIndex::FIRST)),
            2 => Ok(Self::Secondary(ImageIndex::FIRST)),
            3 => Ok(Self::Scratch),
            n => {
                let image = (n - 2) / 2;
                let index = match ImageIndex::new(image) {
                    Ok(index) => index,
                    Err(_) => return Err(Error::NotFound),
                };
                if n % 2 == 0 {
                    Ok(Self::Primary(index))
                } else {
                    Ok(Self::Secondary(index))
                }
            }
        }
    }
}

impl core::fmt::Display for AreaId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bootloader => write!(f, "bootloader"),
            Self::Primary(index) => write!(f, "primary{}", index.get()),
            Self::Secondary(index) => write!(f, "secondary{}", index.get()),
            Self::Scratch => write!(f, "scratch"),
        }
    }
}

impl core::str::FromStr for AreaId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_index = |digits: &str| -> Result<ImageIndex> {
            let n: u8 = digits.parse().map_err(|_| Error::NotFound)?;
            ImageIndex::new(n)
        };

        if s.eq_ignore_ascii_case("bootloader") {
            Ok(Self::Bootloader)
        } else if s.eq_ignore_ascii_case("scratch") {
            Ok(Self::Scratch)
        } else if let Some(n) = s.strip_prefix("primary") {
            Ok(Self::Primary(parse_index(n)?))
        } else if let Some(n) = s.strip_prefix("secondary") {
            Ok(Self::Secondary(parse_index(n)?))
        } else {
            Err(Error::NotFound)
        }
    }
}

/// A named region of one flash device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashArea {
    /// Symbolic identifier
    pub id: AreaId,
    /// Device holding the region
    pub device: FlashDevice,
    /// Byte offset of the region start from the device base
    pub offset: u32,
    /// Region length in bytes
    pub size: u32,
}

impl FlashArea {
    /// Create a new flash area
    pub const fn new(id: AreaId, device: FlashDevice, offset: u32, size: u32) -> Self {
        Self {
            id,
            device,
            offset,
            size,
        }
    }

    /// Exclusive end offset within the device
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    /// Address of the region start once the device is mapped at `device_base`
    pub const fn absolute_address(&self, device_base: u32) -> u32 {
        device_base.wrapping_add(self.offset)
    }

    /// Check if this area overlaps another area on the same device
    pub fn overlaps(&self, other: &FlashArea) -> bool {
        self.device == other.device
            && (self.offset as u64) < other.end()
            && (other.offset as u64) < self.end()
    }

    /// Validate a relative range and return its device offset
    ///
    /// Checks `rel_offset + len <= size` without overflowing.
    pub fn device_offset(&self, rel_offset: u32, len: usize) -> Result<u32> {
        let end = rel_offset as u64 + len as u64;
        if end > self.size as u64 {
            log::error!(
                "{}: range 0x{:X}+0x{:X} exceeds area size 0x{:X}",
                self.id,
                rel_offset,
                len,
                self.size
            );
            return Err(Error::OutOfBounds);
        }
        Ok(self.offset + rel_offset)
    }
}

/// One erase sector of a flash area, as enumerated for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlashSector {
    /// Sector start, offset from the device base
    pub offset: u32,
    /// Sector length in bytes
    pub size: u32,
}
