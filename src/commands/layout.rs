//! Layout command implementations

use super::{format_size, CommandError};
use flashmap_core::area::{AreaId, FlashDevice, FlashSector};
use flashmap_core::config::BoardConfig;
use flashmap_core::slot::{self, ImageIndex, SlotRole};
use flashmap_core::FlashBackend;

/// Show the validated flash areas of a board
pub fn cmd_layout(board: &BoardConfig, toml: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = board.registry()?;

    println!("Layout Information");
    println!("==================");
    println!("Board:    {}", board.name);
    for (name, dev) in [("Internal", &board.internal), ("External", &board.external)] {
        println!(
            "{}: {:#010X} {} (erase {})",
            name,
            dev.base,
            format_size(dev.size),
            format_size(dev.erase_size)
        );
    }

    println!("\nAreas ({}):", registry.len());
    println!(
        "{:<12} {:>4} {:<10} {:>10} {:>10} {:>12}",
        "Name", "Id", "Device", "Offset", "Address", "Size"
    );
    println!("{:-<63}", "");

    for area in &registry {
        let base = registry.geometry(area.device).base;
        println!(
            "{:<12} {:>4} {:<10} {:#010X} {:#010X} {:>12}",
            area.id.to_string(),
            area.id.to_raw(),
            area.device.to_string(),
            area.offset,
            area.absolute_address(base),
            format_size(area.size)
        );
    }

    if toml {
        println!("\n--- TOML Output ---\n");
        print!("{}", board.to_toml_string());
    }

    Ok(())
}

/// Show which area id each image slot resolves to
pub fn cmd_slots(board: &BoardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = board.registry()?;

    println!("{:<8} {:<10} {:>4} {:<12} {:<8}", "Image", "Slot", "Id", "Area", "Present");
    println!("{:-<46}", "");

    for image in ImageIndex::all() {
        for role in [SlotRole::Primary, SlotRole::Secondary] {
            let id = slot::slot_to_area_id(image, role);
            println!(
                "{:<8} {:<10} {:>4} {:<12} {:<8}",
                image.get(),
                role.to_string(),
                id.to_raw(),
                id.to_string(),
                if registry.open(id).is_ok() { "yes" } else { "-" }
            );
        }
    }

    let scratch = registry.open(AreaId::Scratch).is_ok();
    println!(
        "\nScratch area: {}",
        if scratch { "present" } else { "not configured (swap without scratch)" }
    );

    Ok(())
}

/// List the erase sectors of one area
pub fn cmd_sectors(board: &BoardConfig, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id: AreaId = name
        .parse()
        .map_err(|_| CommandError::UnknownArea(name.to_string()))?;
    let registry = board.registry()?;
    let area = *registry
        .open(id)
        .map_err(|_| CommandError::UnknownArea(name.to_string()))?;

    let flash = flashmap_sim::flash_map(&registry, &board.layout())?;
    let sector_size = flash.sector_size(area.device)?;
    let count = area.size.div_ceil(sector_size) as usize;
    let mut sectors = vec![FlashSector::default(); count];
    let found = flash.sectors(id, &mut sectors)?;

    if area.device != FlashDevice::Internal {
        let info = flash.external().info();
        println!(
            "Serial flash: JEDEC {:02X} {:04X}, {}, erase 0x{:02X}, {}-byte addresses",
            info.manufacturer_id,
            info.device_id,
            format_size(info.size),
            info.sector_erase.opcode,
            info.address_width.bytes()
        );
    }
    println!(
        "{} on {}: {} sectors of {}",
        area.id,
        area.device,
        found,
        format_size(sector_size)
    );
    for (i, sector) in sectors[..found].iter().enumerate() {
        println!("  [{:>3}] {:#010X} {:>10}", i, sector.offset, format_size(sector.size));
    }

    Ok(())
}
