//! Round trip over every area on simulated devices

use super::CommandError;
use flashmap_core::config::BoardConfig;
use flashmap_core::FlashBackend;

/// Bytes written per area
const PATTERN_LEN: u32 = 1024;

/// Erase, program, read back and erase again the first sector of each area
pub fn cmd_selftest(board: &BoardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = board.registry()?;
    let mut flash = flashmap_sim::flash_map(&registry, &board.layout())?;

    for area in &registry {
        let sector = flash.sector_size(area.device)?;
        let len = PATTERN_LEN.min(sector).min(area.size);
        log::debug!("selftest: {} ({} bytes, sector 0x{:X})", area.id, len, sector);

        flash.erase(area, 0, sector)?;

        let pattern: Vec<u8> = (0..len).map(|i| (i as u8) ^ area.id.to_raw()).collect();
        flash.write(area, 0, &pattern)?;

        let mut readback = vec![0u8; len as usize];
        flash.read(area, 0, &mut readback)?;
        if let Some(pos) = pattern.iter().zip(&readback).position(|(a, b)| a != b) {
            return Err(CommandError::VerifyFailed {
                area: area.id,
                offset: pos as u32,
            }
            .into());
        }

        flash.erase(area, 0, sector)?;
        if !flash.read_is_empty(area, 0, &mut readback)? {
            return Err(CommandError::VerifyFailed {
                area: area.id,
                offset: 0,
            }
            .into());
        }

        println!(
            "{:<12} {:<10} ok (erased value 0x{:02X})",
            area.id.to_string(),
            area.device.to_string(),
            flash.erased_value(area)
        );
    }

    println!("\nSelftest passed for {} areas", registry.len());
    Ok(())
}
