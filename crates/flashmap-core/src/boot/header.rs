//! Image header
//!
//! Fixed 32-byte little-endian prefix written by the image signing tool at
//! the start of every slot. Only the prefix is parsed here; the TLV area
//! after the payload belongs to the verification engine.

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};

/// Header magic
pub const IMAGE_MAGIC: u32 = 0x96f3_b83d;

/// Size of the fixed header prefix
pub const IMAGE_HEADER_PREFIX_SIZE: usize = 32;

/// Semantic version of an image
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct ImageVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Revision
    pub revision: U16,
    /// Build number
    pub build_num: U32,
}

impl ImageVersion {
    /// Create a version
    pub fn new(major: u8, minor: u8, revision: u16, build_num: u32) -> Self {
        Self {
            major,
            minor,
            revision: U16::new(revision),
            build_num: U32::new(build_num),
        }
    }
}

impl core::fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}.{}.{}+{}",
            self.major,
            self.minor,
            self.revision.get(),
            self.build_num.get()
        )
    }
}

/// Fixed image header prefix
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct ImageHeader {
    magic: U32,
    load_addr: U32,
    hdr_size: U16,
    protect_tlv_size: U16,
    img_size: U32,
    flags: U32,
    version: ImageVersion,
    pad: U32,
}

const _: () = assert!(core::mem::size_of::<ImageHeader>() == IMAGE_HEADER_PREFIX_SIZE);

impl ImageHeader {
    /// Build a header with a valid magic
    pub fn new(hdr_size: u16, img_size: u32, version: ImageVersion) -> Self {
        Self {
            magic: U32::new(IMAGE_MAGIC),
            load_addr: U32::new(0),
            hdr_size: U16::new(hdr_size),
            protect_tlv_size: U16::new(0),
            img_size: U32::new(img_size),
            flags: U32::new(0),
            version,
            pad: U32::new(0),
        }
    }

    /// Parse the header prefix of a slot
    ///
    /// Fails with `InvalidImage` on short input or a bad magic.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (header, _) = Self::read_from_prefix(bytes).map_err(|_| {
            log::debug!(
                "image header needs {} bytes, got {}",
                IMAGE_HEADER_PREFIX_SIZE,
                bytes.len()
            );
            Error::InvalidImage
        })?;
        if !header.is_valid() {
            log::debug!("bad image magic 0x{:08X}", header.magic.get());
            return Err(Error::InvalidImage);
        }
        Ok(header)
    }

    /// Whether the magic matches
    pub fn is_valid(&self) -> bool {
        self.magic.get() == IMAGE_MAGIC
    }

    /// Header magic
    pub fn magic(&self) -> u32 {
        self.magic.get()
    }

    /// Load address for RAM-loaded images, 0 for XIP images
    pub fn load_addr(&self) -> u32 {
        self.load_addr.get()
    }

    /// Size of the header area; the payload starts right after it
    pub fn hdr_size(&self) -> u16 {
        self.hdr_size.get()
    }

    /// Size of the protected TLV area
    pub fn protect_tlv_size(&self) -> u16 {
        self.protect_tlv_size.get()
    }

    /// Payload size, header excluded
    pub fn img_size(&self) -> u32 {
        self.img_size.get()
    }

    /// Image flags
    pub fn flags(&self) -> u32 {
        self.flags.get()
    }

    /// Image version
    pub fn version(&self) -> ImageVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_bytes() {
        let mut bytes = [0u8; 40];
        bytes[0..4].copy_from_slice(&IMAGE_MAGIC.to_le_bytes());
        bytes[8..10].copy_from_slice(&0x400u16.to_le_bytes());
        bytes[4..8].copy_from_slice(&0x0801_8000u32.to_le_bytes());
        bytes[10..12].copy_from_slice(&0x30u16.to_le_bytes());
        bytes[12..16].copy_from_slice(&0x1234u32.to_le_bytes());
        bytes[16..20].copy_from_slice(&0x10u32.to_le_bytes());
        bytes[20] = 1;
        bytes[21] = 2;
        bytes[22..24].copy_from_slice(&3u16.to_le_bytes());
        bytes[24..28].copy_from_slice(&4u32.to_le_bytes());

        let header = ImageHeader::parse(&bytes).unwrap();
        assert_eq!(header.hdr_size(), 0x400);
        assert_eq!(header.img_size(), 0x1234);
        assert_eq!(header.load_addr(), 0x0801_8000);
        assert_eq!(header.protect_tlv_size(), 0x30);
        assert_eq!(header.flags(), 0x10);
        assert_eq!(header.version(), ImageVersion::new(1, 2, 3, 4));
        assert_eq!(header.as_bytes(), &bytes[..32]);
    }

    #[test]
    fn test_rejects_bad_magic_and_short_input() {
        let header = ImageHeader::new(0x400, 0, ImageVersion::new(0, 0, 0, 0));
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(header.as_bytes());
        assert!(ImageHeader::parse(&bytes).is_ok());
        assert_eq!(ImageHeader::parse(&bytes[..31]), Err(Error::InvalidImage));

        bytes[0] ^= 0xFF;
        assert_eq!(ImageHeader::parse(&bytes), Err(Error::InvalidImage));
    }

    #[test]
    fn test_version_display() {
        let v = ImageVersion::new(1, 0, 2, 7);
        assert_eq!(std::format!("{}", v), "1.0.2+7");
    }
}
