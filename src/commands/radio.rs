//! Radio firmware commands

use super::{format_size, CommandError};
use flashmap_core::config::BoardConfig;
use flashmap_core::radio::{RadioBlobLayout, RadioFirmware};
use flashmap_core::Error;
use std::fs;
use std::path::Path;

/// Show the radio blob handles for the board's radio slot
pub fn cmd_radio(board: &BoardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = board.registry()?;
    let slot = *registry
        .open(board.radio_slot)
        .map_err(|_| CommandError::MissingRadioSlot(board.radio_slot))?;

    let mut flash = flashmap_sim::flash_map(&registry, &board.layout())?;
    let external = flash.external_mut();
    external.enable_xip()?;
    let radio = RadioFirmware::locate(&slot, external.xip_base(), &board.radio)?;
    let window = external.xip_window()?;
    let (firmware, calibration) = radio.handles(&window);

    println!(
        "Radio slot: {} ({} at {:#010X})",
        slot.id,
        format_size(slot.size),
        window.base() + slot.offset
    );
    println!(
        "Payload:    {} of {} used",
        board.radio.required_size(),
        slot.size
    );
    println!("\n{:<12} {:>10} {:>10} {:>10}", "Blob", "Address", "End", "Size");
    println!("{:-<45}", "");
    for (name, handle) in [("firmware", firmware), ("calibration", calibration)] {
        println!(
            "{:<12} {:#010X} {:#010X} {:>10}",
            name,
            handle.address,
            handle.end(),
            handle.size
        );
    }

    Ok(())
}

/// Pack firmware and calibration blobs into a radio slot payload
///
/// The output starts with zeroed header space (unless `with_header` is
/// false), followed by the firmware, zero padding and the calibration blob.
/// The signing tool fills in the header and appends the signature.
pub fn cmd_pack(
    board: &BoardConfig,
    firmware: &Path,
    calibration: &Path,
    out: &Path,
    with_header: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let fw = fs::read(firmware)?;
    let cal = fs::read(calibration)?;
    let fw_len = u32::try_from(fw.len()).map_err(|_| CommandError::BlobTooLarge {
        name: "firmware",
        len: fw.len(),
    })?;
    let cal_len = u32::try_from(cal.len()).map_err(|_| CommandError::BlobTooLarge {
        name: "calibration",
        len: cal.len(),
    })?;

    let layout = RadioBlobLayout::packed(
        board.radio.header_size,
        fw_len,
        cal_len,
        board.radio.signature_size,
        board.radio.align,
    )?;
    let payload = pack_payload(&layout, &fw, &cal, with_header);

    let registry = board.registry()?;
    let slot = registry
        .open(board.radio_slot)
        .map_err(|_| CommandError::MissingRadioSlot(board.radio_slot))?;
    if !layout.fits(slot.size) {
        log::error!(
            "payload needs 0x{:X} bytes, slot {} has 0x{:X}",
            layout.required_size(),
            slot.id,
            slot.size
        );
        return Err(Error::LayoutTooLarge.into());
    }

    fs::write(out, &payload)?;
    println!(
        "Firmware:    {} bytes at slot offset {:#X}",
        fw_len,
        layout.firmware_offset()
    );
    println!("Padding:     {} bytes (align {})", layout.pad, layout.align);
    println!(
        "Calibration: {} bytes at slot offset {:#X}",
        cal_len,
        layout.calibration_offset()
    );
    println!("Wrote {} bytes to {:?}", payload.len(), out);

    if layout != board.radio {
        log::warn!("blob sizes differ from the board's radio layout; update the board file");
    }

    Ok(())
}

fn pack_payload(layout: &RadioBlobLayout, fw: &[u8], cal: &[u8], with_header: bool) -> Vec<u8> {
    let mut payload = Vec::with_capacity(layout.required_size() as usize);
    if with_header {
        payload.resize(layout.header_size as usize, 0);
    }
    payload.extend_from_slice(fw);
    payload.resize(payload.len() + layout.pad as usize, 0);
    payload.extend_from_slice(cal);
    payload
}
