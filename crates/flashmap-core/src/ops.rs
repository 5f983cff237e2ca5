//! Flash area operations
//!
//! [`FlashMap`] routes area-relative operations to the adapter of the
//! area's device. Every range is checked against the area before it
//! reaches a driver.

use crate::area::{AreaId, FlashArea, FlashDevice, FlashSector};
use crate::backend::FlashBackend;
use crate::driver::{ExternalFlash, InternalFlash, RowFlash};
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::spi::QspiController;

/// Both flash devices of the board behind one area-addressed interface
pub struct FlashMap<'r, F, C> {
    registry: &'r Registry,
    internal: InternalFlash<F>,
    external: ExternalFlash<C>,
}

impl<'r, F: RowFlash, C: QspiController> FlashMap<'r, F, C> {
    /// Combine the registry and the two device adapters
    pub fn new(
        registry: &'r Registry,
        internal: InternalFlash<F>,
        external: ExternalFlash<C>,
    ) -> Self {
        Self {
            registry,
            internal,
            external,
        }
    }

    /// The area registry
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// On-chip flash adapter
    pub fn internal(&self) -> &InternalFlash<F> {
        &self.internal
    }

    /// Mutable on-chip flash adapter
    pub fn internal_mut(&mut self) -> &mut InternalFlash<F> {
        &mut self.internal
    }

    /// Serial flash adapter
    pub fn external(&self) -> &ExternalFlash<C> {
        &self.external
    }

    /// Mutable serial flash adapter, for XIP control
    pub fn external_mut(&mut self) -> &mut ExternalFlash<C> {
        &mut self.external
    }

    /// Split back into the adapters
    pub fn into_parts(self) -> (InternalFlash<F>, ExternalFlash<C>) {
        (self.internal, self.external)
    }

    fn check_device(device: FlashDevice) -> Result<()> {
        match device {
            FlashDevice::Internal | FlashDevice::External(0) => Ok(()),
            FlashDevice::External(_) => {
                log::error!("no adapter for {} flash", device);
                Err(Error::UnsupportedDevice)
            }
        }
    }

    /// Erase granularity of a device
    pub fn sector_size(&self, device: FlashDevice) -> Result<u32> {
        Self::check_device(device)?;
        Ok(match device {
            FlashDevice::Internal => self.internal.row_size(),
            FlashDevice::External(_) => self.external.sector_size(),
        })
    }
}

impl<F: RowFlash, C: QspiController> FlashBackend for FlashMap<'_, F, C> {
    fn open(&self, id: AreaId) -> Result<FlashArea> {
        self.registry.open(id).copied()
    }

    fn close(&self, area: &FlashArea) {
        self.registry.close(area)
    }

    fn device_base(&self, device: FlashDevice) -> Result<u32> {
        self.registry.device_base(device)
    }

    fn read(&mut self, area: &FlashArea, rel_offset: u32, buf: &mut [u8]) -> Result<()> {
        Self::check_device(area.device)?;
        let offset = area.device_offset(rel_offset, buf.len())?;
        match area.device {
            FlashDevice::Internal => self.internal.read(offset, buf),
            FlashDevice::External(_) => self.external.read(offset, buf),
        }
    }

    fn write(&mut self, area: &FlashArea, rel_offset: u32, data: &[u8]) -> Result<()> {
        Self::check_device(area.device)?;
        let offset = area.device_offset(rel_offset, data.len())?;
        log::trace!("{}: write 0x{:X}+0x{:X}", area.id, rel_offset, data.len());
        match area.device {
            FlashDevice::Internal => self.internal.write(offset, data),
            FlashDevice::External(_) => self.external.write(offset, data),
        }
    }

    fn erase(&mut self, area: &FlashArea, rel_offset: u32, len: u32) -> Result<()> {
        Self::check_device(area.device)?;
        let offset = area.device_offset(rel_offset, len as usize)?;
        log::trace!("{}: erase 0x{:X}+0x{:X}", area.id, rel_offset, len);
        match area.device {
            FlashDevice::Internal => self.internal.erase(offset, len),
            FlashDevice::External(_) => self.external.erase(offset, len),
        }
    }

    fn align(&self, area: &FlashArea) -> u32 {
        match area.device {
            FlashDevice::Internal => self.internal.row_size(),
            FlashDevice::External(_) => self.external.page_size(),
        }
    }

    fn sectors(&self, id: AreaId, out: &mut [FlashSector]) -> Result<usize> {
        let area = self.registry.open(id)?;
        let sector = self.sector_size(area.device)?;
        let count = area.size.div_ceil(sector) as usize;
        if out.len() < count {
            log::error!(
                "{}: {} sectors do not fit a buffer of {}",
                area.id,
                count,
                out.len()
            );
            return Err(Error::BufferTooSmall);
        }
        for (i, entry) in out[..count].iter_mut().enumerate() {
            *entry = FlashSector {
                offset: area.offset + i as u32 * sector,
                size: sector,
            };
        }
        Ok(count)
    }
}
