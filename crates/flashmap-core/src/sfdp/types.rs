//! SFDP type definitions
//!
//! The subset of JEDEC JESD216 structures needed to size the external
//! flash: density, page size, erase types and addressing mode.

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// SFDP signature magic value ("SFDP" in little-endian)
pub const SFDP_SIGNATURE: u32 = 0x50444653;

/// Maximum number of parameter headers to scan
pub const MAX_PARAMETER_HEADERS: usize = 16;

/// Basic Flash Parameter Table ID (MSB << 8 | LSB)
pub const PARAM_ID_BASIC: u16 = 0xFF00;

/// Default page size when the BFPT predates DWORD 11
pub const DEFAULT_PAGE_SIZE: u32 = 256;

/// SFDP revision information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

impl core::fmt::Display for SfdpRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// SFDP header at address 0x00
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SfdpHeader {
    signature: U32,
    minor: u8,
    major: u8,
    nph: u8,
    access_protocol: u8,
}

const _: () = assert!(core::mem::size_of::<SfdpHeader>() == 8);

impl SfdpHeader {
    /// Decode from the first 8 SFDP bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        Self::read_from_prefix(data).ok().map(|(h, _)| h)
    }

    /// Signature matches "SFDP"
    pub fn is_valid(&self) -> bool {
        self.signature.get() == SFDP_SIGNATURE
    }

    /// Header revision
    pub fn revision(&self) -> SfdpRevision {
        SfdpRevision {
            major: self.major,
            minor: self.minor,
        }
    }

    /// Number of parameter headers (the field is 0-based)
    pub fn num_param_headers(&self) -> usize {
        self.nph as usize + 1
    }
}

/// Parameter header, 8 bytes each following the SFDP header
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ParameterHeader {
    id_lsb: u8,
    minor: u8,
    major: u8,
    length_dwords: u8,
    pointer: [u8; 3],
    id_msb: u8,
}

impl ParameterHeader {
    /// Decode one parameter header
    pub fn parse(data: &[u8]) -> Option<Self> {
        Self::read_from_prefix(data).ok().map(|(h, _)| h)
    }

    /// Parameter ID (MSB << 8 | LSB)
    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.id_msb, self.id_lsb])
    }

    /// Table revision
    pub fn revision(&self) -> SfdpRevision {
        SfdpRevision {
            major: self.major,
            minor: self.minor,
        }
    }

    /// Table length in bytes
    pub fn length_bytes(&self) -> usize {
        self.length_dwords as usize * 4
    }

    /// 24-bit byte address of the table
    pub fn table_pointer(&self) -> u32 {
        u32::from_le_bytes([self.pointer[0], self.pointer[1], self.pointer[2], 0])
    }
}

/// One erase type advertised in BFPT DWORDs 8-9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpEraseType {
    /// Erase opcode
    pub opcode: u8,
    /// Erase size in bytes (0 if not supported)
    pub size: u32,
}

impl SfdpEraseType {
    /// Check if this erase type is valid/supported
    pub fn is_valid(&self) -> bool {
        self.size > 0 && self.opcode != 0xFF
    }

    /// Parse from size exponent (N where size = 2^N) and opcode
    pub fn from_raw(size_exp: u8, opcode: u8) -> Self {
        if size_exp == 0 || size_exp >= 32 || opcode == 0xFF {
            Self::default()
        } else {
            Self {
                opcode,
                size: 1u32 << size_exp,
            }
        }
    }
}

/// Parameters read from the Basic Flash Parameter Table
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicFlashParams {
    /// Table revision
    pub revision: SfdpRevision,
    /// Flash density in bytes
    pub density_bytes: u64,
    /// Program page size in bytes
    pub page_size: u32,
    /// Up to four erase types, unsupported entries have size 0
    pub erase_types: [SfdpEraseType; 4],
    /// Part only accepts 4-byte addresses
    pub four_byte_only: bool,
}

impl BasicFlashParams {
    /// Largest supported erase type
    ///
    /// Uniform-sector parts list their native sector last; the bootloader
    /// enumerates and erases in units of that sector.
    pub fn sector_erase(&self) -> Option<SfdpEraseType> {
        self.erase_types
            .iter()
            .copied()
            .filter(|e| e.is_valid())
            .max_by_key(|e| e.size)
    }
}
