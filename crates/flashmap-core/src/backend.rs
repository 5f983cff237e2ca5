//! Flash backend trait
//!
//! The interface the image verification engine drives: open areas, then
//! read, write and erase inside them by area-relative offset.

use crate::area::{AreaId, FlashArea, FlashDevice, FlashSector};
use crate::error::Result;
use crate::slot::{self, ImageIndex, SlotRole};

/// Area-addressed flash access across every device of the board
pub trait FlashBackend {
    /// Look up an area by id
    fn open(&self, id: AreaId) -> Result<FlashArea>;

    /// Release an area obtained from [`open`](Self::open)
    fn close(&self, _area: &FlashArea) {}

    /// Memory-mapped base address of a device
    fn device_base(&self, device: FlashDevice) -> Result<u32>;

    /// Read bytes at an area-relative offset
    fn read(&mut self, area: &FlashArea, rel_offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Program bytes at an area-relative offset
    ///
    /// The target range must have been erased.
    fn write(&mut self, area: &FlashArea, rel_offset: u32, data: &[u8]) -> Result<()>;

    /// Erase bytes at an area-relative offset
    fn erase(&mut self, area: &FlashArea, rel_offset: u32, len: u32) -> Result<()>;

    /// Write granularity of the area's device
    fn align(&self, area: &FlashArea) -> u32;

    /// Value erased bytes read back as
    fn erased_value(&self, area: &FlashArea) -> u8 {
        area.device.erased_value()
    }

    /// Read a range into `buf` and report whether it is fully erased
    fn read_is_empty(&mut self, area: &FlashArea, rel_offset: u32, buf: &mut [u8]) -> Result<bool> {
        self.read(area, rel_offset, buf)?;
        let erased = self.erased_value(area);
        Ok(buf.iter().all(|&b| b == erased))
    }

    /// Enumerate the erase sectors of an area into `out`
    ///
    /// Returns the number of entries written.
    fn sectors(&self, id: AreaId, out: &mut [FlashSector]) -> Result<usize>;

    /// Area id of an image slot
    fn slot_to_area_id(&self, image: ImageIndex, role: SlotRole) -> AreaId {
        slot::slot_to_area_id(image, role)
    }

    /// Slot an area plays for an image
    fn area_id_to_slot(&self, image: ImageIndex, id: AreaId) -> Result<SlotRole> {
        slot::area_id_to_slot(image, id)
    }
}
