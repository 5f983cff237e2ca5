//! Board memory map
//!
//! Compile-time layout of the CY8CPROTO-062-4343W style board: a 2 MiB
//! on-chip flash holding the bootloader and the image 0 primary slot, and a
//! 64 MiB QSPI serial flash holding everything else. The default layout is
//! checked at compile time; layouts loaded at runtime go through
//! [`Registry::from_board`](crate::registry::Registry::from_board).

use crate::area::{AreaId, FlashArea, FlashDevice};
use crate::radio::RadioBlobLayout;
use crate::slot::ImageIndex;

/// Memory-mapped base address of the on-chip flash
pub const INTERNAL_FLASH_BASE: u32 = 0x1000_0000;
/// On-chip flash size
pub const INTERNAL_FLASH_SIZE: u32 = 0x0020_0000;
/// On-chip flash row size (program and erase unit)
pub const INTERNAL_ROW_SIZE: u32 = 512;

/// Base of the QSPI execute-in-place window
pub const EXTERNAL_XIP_BASE: u32 = 0x1800_0000;
/// Serial flash size (S25FL512S)
pub const EXTERNAL_FLASH_SIZE: u32 = 0x0400_0000;
/// Uniform serial flash erase sector size
pub const EXTERNAL_SECTOR_SIZE: u32 = 0x0004_0000;

/// Image header area reserved at the start of every slot
pub const IMAGE_HEADER_SIZE: u32 = 0x400;
/// Trailing signature block appended by the signing tool
pub const IMAGE_SIGNATURE_SIZE: u32 = 0x28;

/// Bootloader region, internal flash
pub const BOOTLOADER_OFFSET: u32 = 0x0000_0000;
/// Bootloader region size
pub const BOOTLOADER_SIZE: u32 = 0x0001_8000;

/// Image 0 primary slot, internal flash
pub const PRIMARY_0_OFFSET: u32 = BOOTLOADER_OFFSET + BOOTLOADER_SIZE;
/// Image 0 slot size
pub const IMAGE_0_SLOT_SIZE: u32 = 0x001C_0000;
/// Image 0 secondary slot, external flash
pub const SECONDARY_0_OFFSET: u32 = 0x0000_0000;

/// Image 1 primary slot, external flash
pub const PRIMARY_1_OFFSET: u32 = 0x0020_0000;
/// Image 1 slot size
pub const IMAGE_1_SLOT_SIZE: u32 = 0x0010_0000;
/// Image 1 secondary slot, external flash
pub const SECONDARY_1_OFFSET: u32 = PRIMARY_1_OFFSET + IMAGE_1_SLOT_SIZE;

/// Size of the radio firmware blob linked into image 1
pub const RADIO_FIRMWARE_SIZE: u32 = 421_098;
/// Size of the radio calibration (CLM) blob
pub const RADIO_CALIBRATION_SIZE: u32 = 7_222;
/// Alignment of the calibration blob inside the slot
pub const RADIO_BLOB_ALIGN: u32 = 16;

const IMAGE_0: ImageIndex = ImageIndex::FIRST;
const IMAGE_1: ImageIndex = match ImageIndex::new(1) {
    Ok(index) => index,
    Err(_) => panic!("board layout needs two images"),
};

/// Slot the radio blobs are packed into
pub const RADIO_SLOT: AreaId = AreaId::Primary(IMAGE_1);

/// Radio payload layout of [`RADIO_SLOT`]
pub const RADIO_LAYOUT: RadioBlobLayout = match RadioBlobLayout::packed(
    IMAGE_HEADER_SIZE,
    RADIO_FIRMWARE_SIZE,
    RADIO_CALIBRATION_SIZE,
    IMAGE_SIGNATURE_SIZE,
    RADIO_BLOB_ALIGN,
) {
    Ok(layout) => layout,
    Err(_) => panic!("radio blob sizes overflow"),
};

/// Flash areas of the default board, in engine id order
pub const DEFAULT_AREAS: [FlashArea; 5] = [
    FlashArea::new(
        AreaId::Bootloader,
        FlashDevice::Internal,
        BOOTLOADER_OFFSET,
        BOOTLOADER_SIZE,
    ),
    FlashArea::new(
        AreaId::Primary(IMAGE_0),
        FlashDevice::Internal,
        PRIMARY_0_OFFSET,
        IMAGE_0_SLOT_SIZE,
    ),
    FlashArea::new(
        AreaId::Secondary(IMAGE_0),
        FlashDevice::External(0),
        SECONDARY_0_OFFSET,
        IMAGE_0_SLOT_SIZE,
    ),
    FlashArea::new(
        AreaId::Primary(IMAGE_1),
        FlashDevice::External(0),
        PRIMARY_1_OFFSET,
        IMAGE_1_SLOT_SIZE,
    ),
    FlashArea::new(
        AreaId::Secondary(IMAGE_1),
        FlashDevice::External(0),
        SECONDARY_1_OFFSET,
        IMAGE_1_SLOT_SIZE,
    ),
];

/// Size and granularity of one flash device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGeometry {
    /// Memory-mapped base address
    pub base: u32,
    /// Capacity in bytes
    pub size: u32,
    /// Minimum erase (and area alignment) unit
    pub erase_size: u32,
}

impl DeviceGeometry {
    /// Check that `area` lies inside the device on erase boundaries
    pub const fn contains(&self, area: &FlashArea) -> bool {
        area.end() <= self.size as u64
            && area.offset % self.erase_size == 0
            && area.size % self.erase_size == 0
            && area.size != 0
    }
}

/// Complete board memory map
#[derive(Debug, Clone, Copy)]
pub struct BoardLayout<'a> {
    /// Board name, for diagnostics
    pub name: &'a str,
    /// On-chip flash geometry
    pub internal: DeviceGeometry,
    /// Serial flash geometry, `base` is the XIP window
    pub external: DeviceGeometry,
    /// Flash areas to register
    pub areas: &'a [FlashArea],
    /// Slot holding the radio blobs
    pub radio_slot: AreaId,
    /// Radio payload packed in `radio_slot`
    pub radio: RadioBlobLayout,
}

impl BoardLayout<'static> {
    /// The built-in board layout
    pub const DEFAULT: Self = Self {
        name: "cy8cproto-062-4343w",
        internal: DeviceGeometry {
            base: INTERNAL_FLASH_BASE,
            size: INTERNAL_FLASH_SIZE,
            erase_size: INTERNAL_ROW_SIZE,
        },
        external: DeviceGeometry {
            base: EXTERNAL_XIP_BASE,
            size: EXTERNAL_FLASH_SIZE,
            erase_size: EXTERNAL_SECTOR_SIZE,
        },
        areas: &DEFAULT_AREAS,
        radio_slot: RADIO_SLOT,
        radio: RADIO_LAYOUT,
    };
}

impl<'a> BoardLayout<'a> {
    /// Geometry of the device an area lives on
    pub const fn geometry(&self, device: FlashDevice) -> &DeviceGeometry {
        match device {
            FlashDevice::Internal => &self.internal,
            FlashDevice::External(_) => &self.external,
        }
    }

    /// Find an area by id
    pub fn area(&self, id: AreaId) -> Option<&FlashArea> {
        self.areas.iter().find(|a| a.id == id)
    }
}

const fn areas_fit(layout: &BoardLayout<'_>) -> bool {
    let mut i = 0;
    while i < layout.areas.len() {
        let area = &layout.areas[i];
        if !layout.geometry(area.device).contains(area) {
            return false;
        }
        let mut j = i + 1;
        while j < layout.areas.len() {
            let other = &layout.areas[j];
            let same_device = match (area.device, other.device) {
                (FlashDevice::Internal, FlashDevice::Internal) => true,
                (FlashDevice::External(a), FlashDevice::External(b)) => a == b,
                _ => false,
            };
            let overlap =
                (area.offset as u64) < other.end() && (other.offset as u64) < area.end();
            if same_device && overlap {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const fn radio_slot_size(layout: &BoardLayout<'_>) -> u32 {
    let mut i = 0;
    while i < layout.areas.len() {
        let area = &layout.areas[i];
        if area.id.to_raw() == layout.radio_slot.to_raw() {
            return area.size;
        }
        i += 1;
    }
    0
}

const _: () = assert!(
    areas_fit(&BoardLayout::DEFAULT),
    "default flash areas overlap or leave their device"
);
const _: () = assert!(
    RADIO_LAYOUT.fits(radio_slot_size(&BoardLayout::DEFAULT)),
    "radio blobs exceed the radio slot"
);
const _: () = assert!(
    INTERNAL_FLASH_BASE as u64 + INTERNAL_FLASH_SIZE as u64 <= EXTERNAL_XIP_BASE as u64,
    "internal flash overlaps the XIP window"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_consistent() {
        assert!(areas_fit(&BoardLayout::DEFAULT));
        assert_eq!(BoardLayout::DEFAULT.areas.len(), 5);
    }

    #[test]
    fn test_primary_0_follows_bootloader() {
        let primary = BoardLayout::DEFAULT
            .area(AreaId::Primary(ImageIndex::FIRST))
            .unwrap();
        assert_eq!(primary.absolute_address(INTERNAL_FLASH_BASE), 0x1001_8000);
    }

    #[test]
    fn test_overlap_detected() {
        let areas = [
            FlashArea::new(AreaId::Bootloader, FlashDevice::Internal, 0, 0x1000),
            FlashArea::new(AreaId::Scratch, FlashDevice::Internal, 0xE00, 0x1000),
        ];
        let layout = BoardLayout {
            areas: &areas,
            ..BoardLayout::DEFAULT
        };
        assert!(!areas_fit(&layout));
    }

    #[test]
    fn test_radio_slot_fits() {
        assert_eq!(radio_slot_size(&BoardLayout::DEFAULT), IMAGE_1_SLOT_SIZE);
        assert!(RADIO_LAYOUT.required_size() <= u64::from(IMAGE_1_SLOT_SIZE));
    }
}
