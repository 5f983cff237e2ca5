//! Flash area registry
//!
//! The registry is built once from a [`BoardLayout`], validated, and then
//! only ever shared by reference. Opening an area is a linear scan over a
//! handful of entries.

use heapless::Vec;

use crate::area::{AreaId, FlashArea, FlashDevice};
use crate::board::{BoardLayout, DeviceGeometry};
use crate::error::{Error, Result};

/// Maximum number of flash areas a registry can hold
pub const MAX_AREAS: usize = 8;

/// Immutable table of the board's flash areas
#[derive(Debug, Clone)]
pub struct Registry {
    areas: Vec<FlashArea, MAX_AREAS>,
    internal: DeviceGeometry,
    external: DeviceGeometry,
}

impl Registry {
    /// Build and validate the registry for a board
    ///
    /// Rejects areas that leave their device, sit off an erase boundary,
    /// overlap another area on the same device or reuse an id.
    pub fn from_board(board: &BoardLayout<'_>) -> Result<Self> {
        for geometry in [&board.internal, &board.external] {
            if geometry.erase_size == 0 || !geometry.erase_size.is_power_of_two() {
                log::error!(
                    "{}: erase size 0x{:X} is not a power of two",
                    board.name,
                    geometry.erase_size
                );
                return Err(Error::LayoutError);
            }
        }

        let mut areas: Vec<FlashArea, MAX_AREAS> = Vec::new();
        for area in board.areas {
            if !board.geometry(area.device).contains(area) {
                log::error!(
                    "{}: area {} (0x{:X}+0x{:X}) does not fit {} flash",
                    board.name,
                    area.id,
                    area.offset,
                    area.size,
                    area.device
                );
                return Err(Error::LayoutError);
            }
            if let Some(other) = areas.iter().find(|a| a.id == area.id) {
                log::error!("{}: duplicate area {}", board.name, other.id);
                return Err(Error::LayoutError);
            }
            if let Some(other) = areas.iter().find(|a| a.overlaps(area)) {
                log::error!("{}: area {} overlaps {}", board.name, area.id, other.id);
                return Err(Error::LayoutError);
            }
            areas.push(*area).map_err(|_| {
                log::error!("{}: more than {} flash areas", board.name, MAX_AREAS);
                Error::LayoutError
            })?;
        }

        log::debug!("{}: registered {} flash areas", board.name, areas.len());
        Ok(Self {
            areas,
            internal: board.internal,
            external: board.external,
        })
    }

    /// Open an area by id
    pub fn open(&self, id: AreaId) -> Result<&FlashArea> {
        self.areas.iter().find(|a| a.id == id).ok_or(Error::NotFound)
    }

    /// Open an area by the engine's numeric id
    pub fn open_raw(&self, raw: u8) -> Result<&FlashArea> {
        self.open(AreaId::from_raw(raw)?)
    }

    /// Release an opened area
    ///
    /// Areas are plain shared references; nothing to release.
    pub fn close(&self, _area: &FlashArea) {}

    /// Memory-mapped base of a device
    ///
    /// Only the on-chip flash has a fixed base here. The serial flash base
    /// is only meaningful while it is mapped, see
    /// [`ExternalFlash::xip_base`](crate::driver::external::ExternalFlash::xip_base).
    pub fn device_base(&self, device: FlashDevice) -> Result<u32> {
        match device {
            FlashDevice::Internal => Ok(self.internal.base),
            FlashDevice::External(_) => {
                log::error!("no fixed base address for {} flash", device);
                Err(Error::UnsupportedDevice)
            }
        }
    }

    /// Base lookup by the engine's raw device id
    pub fn device_base_raw(&self, raw: u8) -> Result<u32> {
        let device = FlashDevice::from_raw(raw).inspect_err(|_| {
            log::error!("unsupported flash device id 0x{:02X}", raw);
        })?;
        self.device_base(device)
    }

    /// Geometry of a device
    pub fn geometry(&self, device: FlashDevice) -> &DeviceGeometry {
        match device {
            FlashDevice::Internal => &self.internal,
            FlashDevice::External(_) => &self.external,
        }
    }

    /// Iterate over the registered areas in registration order
    pub fn iter(&self) -> impl Iterator<Item = &FlashArea> {
        self.areas.iter()
    }

    /// Number of registered areas
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// Whether no areas are registered
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

impl<'r> IntoIterator for &'r Registry {
    type Item = &'r FlashArea;
    type IntoIter = core::slice::Iter<'r, FlashArea>;

    fn into_iter(self) -> Self::IntoIter {
        self.areas.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{self, BoardLayout};
    use crate::slot::ImageIndex;

    fn registry() -> Registry {
        Registry::from_board(&BoardLayout::DEFAULT).unwrap()
    }

    #[test]
    fn test_default_registry() {
        let reg = registry();
        assert_eq!(reg.len(), 5);
        assert!(!reg.is_empty());
        assert_eq!(reg.open(AreaId::Scratch), Err(Error::NotFound));

        let boot = reg.open(AreaId::Bootloader).unwrap();
        assert_eq!(boot.device, FlashDevice::Internal);
        assert_eq!(boot.size, board::BOOTLOADER_SIZE);
    }

    #[test]
    fn test_open_close_does_not_mutate() {
        let reg = registry();
        let before: std::vec::Vec<FlashArea> = reg.iter().copied().collect();
        for area in &reg {
            let opened = reg.open(area.id).unwrap();
            assert_eq!(opened, area);
            reg.close(opened);
        }
        let after: std::vec::Vec<FlashArea> = reg.iter().copied().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_open_raw() {
        let reg = registry();
        let area = reg.open_raw(4).unwrap();
        assert_eq!(area.id, AreaId::Primary(ImageIndex::new(1).unwrap()));
        assert_eq!(reg.open_raw(3), Err(Error::NotFound));
        assert_eq!(reg.open_raw(9), Err(Error::NotFound));
    }

    #[test]
    fn test_device_base() {
        let reg = registry();
        assert_eq!(reg.device_base(FlashDevice::Internal), Ok(0x1000_0000));
        assert_eq!(
            reg.device_base(FlashDevice::External(0)),
            Err(Error::UnsupportedDevice)
        );
        assert_eq!(reg.device_base_raw(0x7F), Ok(0x1000_0000));
        assert_eq!(reg.device_base_raw(0x80), Err(Error::UnsupportedDevice));
        assert_eq!(reg.device_base_raw(0x01), Err(Error::UnsupportedDevice));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let areas = [
            FlashArea::new(AreaId::Bootloader, FlashDevice::Internal, 0, 0x200),
            FlashArea::new(AreaId::Bootloader, FlashDevice::Internal, 0x200, 0x200),
        ];
        let layout = BoardLayout {
            areas: &areas,
            ..BoardLayout::DEFAULT
        };
        assert_eq!(Registry::from_board(&layout).unwrap_err(), Error::LayoutError);
    }

    #[test]
    fn test_rejects_misaligned_and_oversized_areas() {
        let misaligned = [FlashArea::new(
            AreaId::Scratch,
            FlashDevice::External(0),
            0x1000,
            board::EXTERNAL_SECTOR_SIZE,
        )];
        let layout = BoardLayout {
            areas: &misaligned,
            ..BoardLayout::DEFAULT
        };
        assert_eq!(Registry::from_board(&layout).unwrap_err(), Error::LayoutError);

        let oversized = [FlashArea::new(
            AreaId::Scratch,
            FlashDevice::Internal,
            0,
            board::INTERNAL_FLASH_SIZE + board::INTERNAL_ROW_SIZE,
        )];
        let layout = BoardLayout {
            areas: &oversized,
            ..BoardLayout::DEFAULT
        };
        assert_eq!(Registry::from_board(&layout).unwrap_err(), Error::LayoutError);
    }

    #[test]
    fn test_rejects_overlap() {
        let areas = [
            FlashArea::new(AreaId::Bootloader, FlashDevice::Internal, 0, 0x400),
            FlashArea::new(AreaId::Scratch, FlashDevice::Internal, 0x200, 0x400),
        ];
        let layout = BoardLayout {
            areas: &areas,
            ..BoardLayout::DEFAULT
        };
        assert_eq!(Registry::from_board(&layout).unwrap_err(), Error::LayoutError);
    }

    #[test]
    fn test_rejects_too_many_areas() {
        let areas: std::vec::Vec<FlashArea> = (0..9)
            .map(|i| {
                FlashArea::new(
                    AreaId::Bootloader,
                    FlashDevice::Internal,
                    i * 0x200,
                    0x200,
                )
            })
            .collect();
        let layout = BoardLayout {
            areas: &areas,
            ..BoardLayout::DEFAULT
        };
        assert!(Registry::from_board(&layout).is_err());
    }
}
