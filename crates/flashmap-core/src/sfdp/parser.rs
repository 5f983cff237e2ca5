//! SFDP parsing implementation

use crate::error::{Error, Result};
use crate::protocol;
use crate::spi::SpiMaster;

use super::types::*;

/// Parse the SFDP header and verify signature
fn parse_header<M: SpiMaster + ?Sized>(master: &mut M) -> Result<SfdpHeader> {
    let mut buf = [0u8; 8];
    protocol::read_sfdp(master, 0x00, &mut buf)?;

    let header = SfdpHeader::parse(&buf).ok_or(Error::ChipNotSupported)?;

    if !header.is_valid() {
        log::debug!("SFDP signature invalid (expected 'SFDP')");
        return Err(Error::ChipNotSupported);
    }

    let revision = header.revision();
    if revision.major != 1 {
        log::debug!("SFDP major version {} not supported", revision.major);
        return Err(Error::ChipNotSupported);
    }

    log::debug!("SFDP header valid: revision {}", revision);

    Ok(header)
}

/// Read and parse a parameter header
fn read_param_header<M: SpiMaster + ?Sized>(
    master: &mut M,
    index: usize,
) -> Result<ParameterHeader> {
    let mut buf = [0u8; 8];
    let addr = 0x08 + (index as u32 * 8);
    protocol::read_sfdp(master, addr, &mut buf)?;
    ParameterHeader::parse(&buf).ok_or(Error::ChipNotSupported)
}

/// Decode BFPT DWORD 2 (density)
fn parse_density(dword: u32) -> u64 {
    // Bit 31 clear: bits 30:0 hold density-1 in bits; set: density = 2^N bits
    if dword & (1 << 31) == 0 {
        ((dword & 0x7FFF_FFFF) as u64 + 1) / 8
    } else {
        let n = dword & 0x7FFF_FFFF;
        if (3..64).contains(&n) {
            1u64 << (n - 3)
        } else {
            0
        }
    }
}

/// Parse the Basic Flash Parameter Table
fn parse_bfpt<M: SpiMaster + ?Sized>(
    master: &mut M,
    header: &ParameterHeader,
) -> Result<BasicFlashParams> {
    let len = header.length_bytes();
    if len < 36 {
        // Minimum is 9 DWORDs (JESD216)
        return Err(Error::ChipNotSupported);
    }

    let mut buf = [0u8; 64];
    let read_len = core::cmp::min(len, buf.len());
    protocol::read_sfdp(master, header.table_pointer(), &mut buf[..read_len])?;

    let get_dword = |offset: usize| -> u32 {
        if offset + 4 <= read_len {
            u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
        } else {
            0
        }
    };

    let dword1 = get_dword(0);
    let dword8 = get_dword(28);
    let dword9 = get_dword(32);

    let mut params = BasicFlashParams {
        revision: header.revision(),
        density_bytes: parse_density(get_dword(4)),
        page_size: DEFAULT_PAGE_SIZE,
        erase_types: [
            SfdpEraseType::from_raw(dword8 as u8, (dword8 >> 8) as u8),
            SfdpEraseType::from_raw((dword8 >> 16) as u8, (dword8 >> 24) as u8),
            SfdpEraseType::from_raw(dword9 as u8, (dword9 >> 8) as u8),
            SfdpEraseType::from_raw((dword9 >> 16) as u8, (dword9 >> 24) as u8),
        ],
        // Bits [18:17] - 0b10 means 4-byte addressing only
        four_byte_only: (dword1 >> 17) & 0x03 == 0b10,
    };

    // DWORD 11 bits [7:4] - page size exponent (JESD216A+)
    if len >= 44 {
        let page_size_exp = (get_dword(40) >> 4) & 0x0F;
        if page_size_exp > 0 {
            params.page_size = 1u32 << page_size_exp;
        }
    }

    if params.density_bytes == 0 {
        return Err(Error::ChipNotSupported);
    }

    Ok(params)
}

/// Probe for SFDP support and parse the Basic Flash Parameter Table
///
/// Returns `Err(ChipNotSupported)` if the part doesn't answer with SFDP,
/// has an unsupported revision, or lacks a usable BFPT.
pub fn probe<M: SpiMaster + ?Sized>(master: &mut M) -> Result<BasicFlashParams> {
    let header = parse_header(master)?;

    let num_headers = core::cmp::min(header.num_param_headers(), MAX_PARAMETER_HEADERS);
    for i in 0..num_headers {
        let param_header = read_param_header(master, i)?;
        if param_header.id() == PARAM_ID_BASIC {
            let params = parse_bfpt(master, &param_header)?;
            log::debug!(
                "BFPT rev {}: {} bytes, page {} bytes",
                params.revision,
                params.density_bytes,
                params.page_size
            );
            return Ok(params);
        }
        log::trace!("Skipping parameter table ID 0x{:04X}", param_header.id());
    }

    Err(Error::ChipNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_density() {
        // 512 Mbit expressed both ways
        assert_eq!(parse_density(0x1FFF_FFFF), 64 * 1024 * 1024);
        assert_eq!(parse_density(0x8000_001D), 64 * 1024 * 1024);
        assert_eq!(parse_density(0x8000_0001), 0);
    }

    #[test]
    fn test_header_layout() {
        let raw = [b'S', b'F', b'D', b'P', 0x06, 0x01, 0x01, 0xFF];
        let header = SfdpHeader::parse(&raw).unwrap();
        assert!(header.is_valid());
        assert_eq!(header.revision(), SfdpRevision { major: 1, minor: 6 });
        assert_eq!(header.num_param_headers(), 2);

        let raw = [0x00, 0x06, 0x01, 0x10, 0x30, 0x00, 0x00, 0xFF];
        let param = ParameterHeader::parse(&raw).unwrap();
        assert_eq!(param.id(), PARAM_ID_BASIC);
        assert_eq!(param.length_bytes(), 64);
        assert_eq!(param.table_pointer(), 0x30);
        assert!(ParameterHeader::parse(&[0; 4]).is_none());
    }

    #[test]
    fn test_sector_erase_picks_largest() {
        let params = BasicFlashParams {
            erase_types: [
                SfdpEraseType::from_raw(12, 0x20),
                SfdpEraseType::from_raw(18, 0xD8),
                SfdpEraseType::from_raw(0, 0xFF),
                SfdpEraseType::from_raw(0, 0xFF),
            ],
            ..Default::default()
        };
        let erase = params.sector_erase().unwrap();
        assert_eq!(erase.size, 256 * 1024);
        assert_eq!(erase.opcode, 0xD8);
    }
}
