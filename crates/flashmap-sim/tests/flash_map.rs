//! End-to-end flash area tests over the simulated board

use flashmap_core::board::{self, BoardLayout};
use flashmap_core::boot::{
    boot_or_park, bring_up_or_halt, BootHandoff, BootResponse, ImageHeader, ImageVersion,
    Resources,
};
use flashmap_core::driver::{ExternalFlash, XipMode};
use flashmap_core::radio::{RadioFirmware, ResourceKind};
use flashmap_core::spi::QspiController;
use flashmap_core::{
    AreaId, Error, FlashArea, FlashBackend, FlashDevice, FlashSector, ImageIndex, Registry,
    SlotRole,
};
use flashmap_sim::{PlatformEvent, SimPlatform, SimQspi, SimQspiConfig};

fn registry() -> Registry {
    Registry::from_board(&BoardLayout::DEFAULT).unwrap()
}

fn image1() -> ImageIndex {
    ImageIndex::new(1).unwrap()
}

#[test]
fn internal_write_read_round_trip() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Primary(ImageIndex::FIRST)).unwrap();
    assert_eq!(map.align(&area), 512);
    assert_eq!(map.erased_value(&area), 0x00);

    let data: Vec<u8> = (0..2048u32).map(|i| (i * 7) as u8).collect();
    map.write(&area, 0x400, &data).unwrap();

    let mut back = vec![0u8; data.len()];
    map.read(&area, 0x400, &mut back).unwrap();
    assert_eq!(back, data);

    // Exactly four rows, each written once
    let rows = map.internal().inner();
    assert_eq!(rows.total_programs(), 4);
    for row in 0..4 {
        let addr = board::INTERNAL_FLASH_BASE + area.offset + 0x400 + row * 512;
        assert_eq!(rows.program_count(addr), 1);
    }

    map.erase(&area, 0x400, 2048).unwrap();
    let mut buf = vec![0xAAu8; 2048];
    assert!(map.read_is_empty(&area, 0x400, &mut buf).unwrap());
    assert_eq!(map.internal().inner().total_erases(), 4);
}

#[test]
fn internal_write_must_be_row_aligned() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Bootloader).unwrap();

    assert_eq!(map.write(&area, 0x10, &[0; 512]), Err(Error::InvalidAlignment));
    assert_eq!(map.write(&area, 0, &[0; 500]), Err(Error::InvalidAlignment));
    assert_eq!(map.erase(&area, 0, 100), Err(Error::InvalidAlignment));
    assert_eq!(map.internal().inner().total_programs(), 0);
}

#[test]
fn internal_write_stops_at_failing_row() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Primary(ImageIndex::FIRST)).unwrap();
    let bad_row = board::INTERNAL_FLASH_BASE + area.offset + 512;
    map.internal_mut().inner_mut().fail_program_at(Some(bad_row));

    let err = map.write(&area, 0, &[0x11; 1536]).unwrap_err();
    assert_eq!(err, Error::ProgramFailed { addr: bad_row });
    assert_eq!(err.status(), -9);

    let rows = map.internal().inner();
    assert_eq!(rows.total_programs(), 1);
    assert_eq!(rows.program_count(bad_row + 512), 0);
}

#[test]
fn external_write_read_round_trip() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Secondary(ImageIndex::FIRST)).unwrap();
    assert_eq!(map.align(&area), 512);
    assert_eq!(map.erased_value(&area), 0xFF);

    let mut buf = vec![0u8; 4096];
    assert!(map.read_is_empty(&area, 0, &mut buf).unwrap());

    // Unaligned start, spans three pages
    let data: Vec<u8> = (0..1200u32).map(|i| (i % 251) as u8).collect();
    map.write(&area, 0x100, &data).unwrap();
    assert_eq!(map.external().controller().page_programs(), 3);

    let mut back = vec![0u8; data.len()];
    map.read(&area, 0x100, &mut back).unwrap();
    assert_eq!(back, data);
    assert!(!map.read_is_empty(&area, 0x100, &mut back).unwrap());

    map.erase(&area, 0, board::EXTERNAL_SECTOR_SIZE).unwrap();
    let mut buf = vec![0u8; 0x2000];
    assert!(map.read_is_empty(&area, 0, &mut buf).unwrap());
}

#[test]
fn external_erase_needs_whole_sectors() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Primary(image1())).unwrap();
    assert_eq!(map.erase(&area, 0x1000, 0x1000), Err(Error::InvalidAlignment));
    assert_eq!(map.external().controller().sector_erases(), 0);
}

#[test]
fn external_erase_failure_is_reported() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Secondary(image1())).unwrap();
    let bad = area.offset + board::EXTERNAL_SECTOR_SIZE;
    map.external_mut().controller_mut().fail_erase_at(Some(bad));

    assert_eq!(
        map.erase(&area, 0, 2 * board::EXTERNAL_SECTOR_SIZE),
        Err(Error::EraseFailed { addr: bad })
    );
    assert_eq!(map.external().controller().sector_erases(), 1);
}

#[test]
fn out_of_bounds_is_an_error() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Primary(image1())).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(map.read(&area, area.size - 8, &mut buf), Err(Error::OutOfBounds));
    assert_eq!(map.read(&area, u32::MAX, &mut buf), Err(Error::OutOfBounds));
    assert_eq!(
        map.erase(&area, area.size, board::EXTERNAL_SECTOR_SIZE),
        Err(Error::OutOfBounds)
    );
}

#[test]
fn unknown_device_is_rejected() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = FlashArea::new(AreaId::Scratch, FlashDevice::External(1), 0, 0x40000);
    let mut buf = [0u8; 4];
    assert_eq!(map.read(&area, 0, &mut buf), Err(Error::UnsupportedDevice));
}

#[test]
fn sector_enumeration() {
    let reg = registry();
    let map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();

    let mut sectors = [FlashSector::default(); 8];
    let n = map.sectors(AreaId::Primary(image1()), &mut sectors).unwrap();
    assert_eq!(n, 4);
    assert_eq!(sectors[0].offset, board::PRIMARY_1_OFFSET);
    assert_eq!(sectors[3].offset, board::PRIMARY_1_OFFSET + 3 * 0x40000);
    assert!(sectors[..n].iter().all(|s| s.size == 0x40000));

    let mut rows = vec![FlashSector::default(); 0x18000 / 512];
    let n = map.sectors(AreaId::Bootloader, &mut rows).unwrap();
    assert_eq!(n, 0x18000 / 512);
    assert_eq!(rows[1].offset, 512);

    let mut small = [FlashSector::default(); 2];
    assert_eq!(
        map.sectors(AreaId::Primary(image1()), &mut small),
        Err(Error::BufferTooSmall)
    );
    assert_eq!(map.sectors(AreaId::Scratch, &mut sectors), Err(Error::NotFound));
}

#[test]
fn device_base_lookup() {
    let reg = registry();
    let map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    assert_eq!(map.device_base(FlashDevice::Internal), Ok(0x1000_0000));
    assert_eq!(
        map.device_base(FlashDevice::External(0)),
        Err(Error::UnsupportedDevice)
    );
    assert_eq!(map.external().xip_base(), board::EXTERNAL_XIP_BASE);
}

#[test]
fn serial_flash_identity_reported() {
    let reg = registry();
    let map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let info = map.external().info();
    assert_eq!(info.manufacturer_id, 0x01);
    assert_eq!(info.device_id, 0x0220);
    assert_eq!(info.size, map.external().size());
    assert_eq!(info.sector_erase.size, map.external().sector_size());
    assert_eq!(info.address_width.bytes(), 4);
}

#[test]
fn slot_translation_through_backend() {
    let reg = registry();
    let map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    for image in ImageIndex::all() {
        for role in [SlotRole::Primary, SlotRole::Secondary] {
            let id = map.slot_to_area_id(image, role);
            assert!(map.open(id).is_ok());
            assert_eq!(map.area_id_to_slot(image, id), Ok(role));
        }
    }
}

#[test]
fn program_forces_xip_off_and_restores_on_request() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let area = map.open(AreaId::Primary(image1())).unwrap();

    map.external_mut().enable_xip().unwrap();
    map.write(&area, 0, &[0x42; 32]).unwrap();
    assert_eq!(map.external().mode(), XipMode::Command);

    map.external_mut().set_restore_xip(true);
    map.external_mut().enable_xip().unwrap();
    map.write(&area, 512, &[0x43; 32]).unwrap();
    assert_eq!(map.external().mode(), XipMode::Memory);

    // Reads in memory mode come from the mapped window
    let mut buf = [0u8; 32];
    map.read(&area, 512, &mut buf).unwrap();
    assert_eq!(buf, [0x43; 32]);

    map.erase(&area, 0, board::EXTERNAL_SECTOR_SIZE).unwrap();
    assert_eq!(map.external().mode(), XipMode::Memory);
    map.read(&area, 0, &mut buf).unwrap();
    assert_eq!(buf, [0xFF; 32]);
}

#[test]
fn radio_handles_need_xip_window() {
    let reg = registry();
    let mut map = flashmap_sim::flash_map(&reg, &BoardLayout::DEFAULT).unwrap();
    let slot = map.open(board::RADIO_SLOT).unwrap();
    let xip_base = map.external().xip_base();
    let radio = RadioFirmware::locate(&slot, xip_base, &board::RADIO_LAYOUT).unwrap();

    // Stage a firmware image in the slot
    let firmware: Vec<u8> = (0..64u32).map(|i| i as u8).collect();
    map.write(&slot, board::IMAGE_HEADER_SIZE, &firmware).unwrap();

    let external = map.external_mut();
    assert!(matches!(external.xip_window(), Err(Error::XipInactive)));

    external.enable_xip().unwrap();
    let window = external.xip_window().unwrap();
    let (fw, clm) = radio.handles(&window);
    assert_eq!(fw.kind, ResourceKind::InMemory);
    assert_eq!(fw.address, xip_base + board::PRIMARY_1_OFFSET + board::IMAGE_HEADER_SIZE);
    assert_eq!(clm.address, fw.address + fw.size + board::RADIO_LAYOUT.pad);

    let mut buf = [0u8; 64];
    window.read_resource(&fw, 0, &mut buf).unwrap();
    assert_eq!(&buf[..], &firmware[..]);
    assert_eq!(
        window.read_resource(&clm, clm.size - 1, &mut buf),
        Err(Error::OutOfBounds)
    );
}

#[test]
fn missing_part_is_rejected() {
    let qspi = SimQspi::new(SimQspiConfig {
        manufacturer_id: 0xFF,
        ..SimQspiConfig::default()
    });
    assert!(matches!(
        ExternalFlash::probe(qspi),
        Err(Error::ChipNotSupported)
    ));

    let qspi = SimQspi::new(SimQspiConfig {
        four_byte_addr: false,
        ..SimQspiConfig::default()
    });
    assert!(matches!(
        ExternalFlash::probe(qspi),
        Err(Error::ChipNotSupported)
    ));
}

#[test]
fn small_part_uses_three_byte_addresses() {
    let qspi = SimQspi::new(SimQspiConfig {
        size: 16 * 1024 * 1024,
        sector_size: 0x10000,
        page_size: 256,
        four_byte_addr: false,
        ..SimQspiConfig::default()
    });
    let mut flash = ExternalFlash::probe(qspi).unwrap();
    assert_eq!(flash.size(), 16 * 1024 * 1024);
    assert_eq!(flash.sector_size(), 0x10000);
    assert_eq!(flash.page_size(), 256);

    flash.write(0xFFFF00, &[0x5A; 0x100]).unwrap();
    let mut buf = [0u8; 0x100];
    flash.read(0xFFFF00, &mut buf).unwrap();
    assert_eq!(buf, [0x5A; 0x100]);
}

#[test]
fn boot_scenario_entry_address() {
    let reg = registry();
    let primary = reg.open(AreaId::Primary(ImageIndex::FIRST)).unwrap();
    let base = reg.device_base(primary.device).unwrap();

    let response = BootResponse {
        image_offset: primary.absolute_address(base),
        header: ImageHeader::new(0x400, 0x1000, ImageVersion::new(1, 0, 0, 0)),
    };
    let mut platform = SimPlatform::new();
    let mut handoff = BootHandoff::new();
    assert_eq!(handoff.hand_off(&mut platform, response).unwrap(), 0x1001_8400);
    assert_eq!(platform.released(), Resources::all());
    assert_eq!(
        platform.events().last(),
        Some(&PlatformEvent::StartAppCore { entry: 0x1001_8400 })
    );
}

#[test]
#[should_panic(expected = "parked")]
fn boot_without_image_parks() {
    let mut platform = SimPlatform::new().with_park_limit(3);
    boot_or_park(&mut platform, None);
}

#[test]
#[should_panic(expected = "parked")]
fn missing_serial_flash_halts_boot() {
    let qspi = SimQspi::new(SimQspiConfig {
        manufacturer_id: 0xFF,
        ..SimQspiConfig::default()
    });
    let mut platform = SimPlatform::new().with_park_limit(2);
    bring_up_or_halt(qspi, &mut platform);
}

#[test]
fn serial_flash_bring_up_continues_boot() {
    let mut platform = SimPlatform::new().with_park_limit(1);
    let external = bring_up_or_halt(SimQspi::new_default(), &mut platform);
    assert_eq!(external.size(), board::EXTERNAL_FLASH_SIZE);
    assert!(platform.events().is_empty());
}

#[test]
fn deinit_powers_controller_down() {
    let mut external = ExternalFlash::probe(SimQspi::new_default()).unwrap();
    external.enable_xip().unwrap();
    let mut qspi = external.deinit();
    assert!(qspi.is_powered_down());
    assert!(!qspi.memory_mode());
    assert_eq!(qspi.set_memory_mode(true), Err(Error::SpiTransferFailed));
    assert!(ExternalFlash::probe(qspi).is_err());
}

#[test]
fn registry_from_board_file() {
    let config = flashmap_core::config::BoardConfig::default();
    let reg = config.registry().unwrap();
    let mut map = flashmap_sim::flash_map(&reg, &config.layout()).unwrap();
    let area = map.open(AreaId::Secondary(image1())).unwrap();
    map.write(&area, 0, b"hello").unwrap();
    let mut buf = [0u8; 5];
    map.read(&area, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello");
}
