//! Radio firmware locator
//!
//! The radio (Wi-Fi) firmware and its calibration blob are not linked into
//! the application. They are packed into an external flash slot right after
//! the image header and read in place through the XIP window:
//!
//! ```text
//! | header | firmware | pad | calibration | ... | signature |
//! ```
//!
//! Addresses are computed once; the handles can only be obtained while an
//! [`XipWindow`] proves the window is mapped.

use crate::area::{FlashArea, FlashDevice};
use crate::driver::external::XipWindow;
use crate::error::{Error, Result};
use crate::spi::QspiController;

/// How a resource is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Directly addressable memory
    InMemory,
}

/// Read-only blob descriptor handed to the radio firmware loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceHandle {
    /// Access method
    pub kind: ResourceKind,
    /// Blob length in bytes
    pub size: u32,
    /// Absolute (mapped) address of the first byte
    pub address: u32,
}

impl ResourceHandle {
    /// Exclusive end address
    pub const fn end(&self) -> u64 {
        self.address as u64 + self.size as u64
    }
}

/// Sizes of everything packed into the radio slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioBlobLayout {
    /// Image header area preceding the firmware
    pub header_size: u32,
    /// Radio firmware blob
    pub firmware_size: u32,
    /// Padding between firmware and calibration
    pub pad: u32,
    /// Calibration blob
    pub calibration_size: u32,
    /// Trailing image signature
    pub signature_size: u32,
    /// Calibration alignment the pad was derived from
    pub align: u32,
}

impl RadioBlobLayout {
    /// Pack the blobs back to back, padding so that the calibration blob
    /// starts on an `align` boundary relative to the slot start
    ///
    /// Fails with `LayoutTooLarge` when the blobs do not fit a 32-bit slot.
    pub const fn packed(
        header_size: u32,
        firmware_size: u32,
        calibration_size: u32,
        signature_size: u32,
        align: u32,
    ) -> Result<Self> {
        let used = match header_size.checked_add(firmware_size) {
            Some(used) => used,
            None => return Err(Error::LayoutTooLarge),
        };
        let pad = if align <= 1 {
            0
        } else {
            (align - used % align) % align
        };
        let calibration_offset = match used.checked_add(pad) {
            Some(offset) => offset,
            None => return Err(Error::LayoutTooLarge),
        };
        if calibration_offset.checked_add(calibration_size).is_none() {
            return Err(Error::LayoutTooLarge);
        }
        Ok(Self {
            header_size,
            firmware_size,
            pad,
            calibration_size,
            signature_size,
            align,
        })
    }

    /// Slot bytes the payload needs, signature included
    pub const fn required_size(&self) -> u64 {
        self.header_size as u64
            + self.firmware_size as u64
            + self.pad as u64
            + self.calibration_size as u64
            + self.signature_size as u64
    }

    /// Whether the payload fits a slot of `slot_size` bytes
    pub const fn fits(&self, slot_size: u32) -> bool {
        self.required_size() <= slot_size as u64
    }

    /// Offset of the firmware blob from the slot start
    pub const fn firmware_offset(&self) -> u32 {
        self.header_size
    }

    /// Offset of the calibration blob from the slot start
    pub const fn calibration_offset(&self) -> u32 {
        self.header_size + self.firmware_size + self.pad
    }
}

/// Located radio blobs of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioFirmware {
    firmware: ResourceHandle,
    calibration: ResourceHandle,
}

impl RadioFirmware {
    /// Compute the blob addresses inside `slot`
    ///
    /// `xip_base` is the address the external device is mapped at.
    pub fn locate(slot: &FlashArea, xip_base: u32, layout: &RadioBlobLayout) -> Result<Self> {
        if !matches!(slot.device, FlashDevice::External(_)) {
            log::error!("radio slot {} is not on external flash", slot.id);
            return Err(Error::UnsupportedDevice);
        }
        if !layout.fits(slot.size) {
            log::error!(
                "radio payload needs 0x{:X} bytes, slot {} has 0x{:X}",
                layout.required_size(),
                slot.id,
                slot.size
            );
            return Err(Error::LayoutTooLarge);
        }

        let slot_base = xip_base
            .checked_add(slot.offset)
            .ok_or(Error::OutOfBounds)?;
        if slot_base as u64 + slot.size as u64 > u32::MAX as u64 + 1 {
            return Err(Error::OutOfBounds);
        }

        let firmware = ResourceHandle {
            kind: ResourceKind::InMemory,
            size: layout.firmware_size,
            address: slot_base + layout.firmware_offset(),
        };
        let calibration = ResourceHandle {
            kind: ResourceKind::InMemory,
            size: layout.calibration_size,
            address: firmware.address + layout.firmware_size + layout.pad,
        };
        log::debug!(
            "radio firmware at 0x{:08X}, calibration at 0x{:08X}",
            firmware.address,
            calibration.address
        );

        Ok(Self {
            firmware,
            calibration,
        })
    }

    /// Firmware and calibration handles, valid while `window` is alive
    pub fn handles<C: QspiController>(
        &self,
        _window: &XipWindow<'_, C>,
    ) -> (ResourceHandle, ResourceHandle) {
        (self.firmware, self.calibration)
    }
}
