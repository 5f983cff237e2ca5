//! Serial flash adapter
//!
//! Drives a JEDEC serial NOR part behind a quad-SPI controller. The
//! controller is either in command mode (SPI25 commands go out on the bus)
//! or in memory mode (the part is mapped and executed in place). The two
//! are mutually exclusive:
//!
//! - every program and erase runs under a [`ProgramGuard`] that forces
//!   memory mode off, and turns it back on afterwards only when
//!   [`ExternalFlash::set_restore_xip`] asked for it;
//! - [`XipWindow`] mutably borrows the adapter, so no program or erase can
//!   be issued while mapped data is being handed out.

use core::ops::{Deref, DerefMut};

use crate::error::{Error, Result};
use crate::protocol;
use crate::radio::ResourceHandle;
use crate::sfdp::{self, SfdpEraseType};
use crate::spi::{AddressWidth, QspiController, SpiFeatures};

/// Controller access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XipMode {
    /// SPI25 commands, program and erase allowed
    Command,
    /// Device mapped at the XIP window, read only
    Memory,
}

impl core::fmt::Display for XipMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Memory => write!(f, "memory-mapped"),
        }
    }
}

/// Parameters discovered while probing the part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalFlashInfo {
    /// JEDEC manufacturer id
    pub manufacturer_id: u8,
    /// JEDEC device id
    pub device_id: u16,
    /// Capacity in bytes
    pub size: u32,
    /// Program page size in bytes
    pub page_size: u32,
    /// Uniform sector erase used for every erase
    pub sector_erase: SfdpEraseType,
    /// Address width of read/program/erase commands
    pub address_width: AddressWidth,
}

/// Serial flash on a quad-SPI controller
#[derive(Debug)]
pub struct ExternalFlash<C> {
    ctrl: C,
    info: ExternalFlashInfo,
    restore_xip: bool,
}

impl<C: QspiController> ExternalFlash<C> {
    /// Identify the part and read its SFDP parameters
    ///
    /// The controller is switched to command mode and the part is reset
    /// before the probe. It is left in command mode.
    pub fn probe(mut ctrl: C) -> Result<Self> {
        if ctrl.memory_mode() {
            log::debug!("leaving XIP mode for probe");
            ctrl.set_memory_mode(false)?;
        }
        // Drop any half-finished command sequence left by the previous stage
        protocol::software_reset(&mut ctrl)?;

        let (manufacturer_id, device_id) = protocol::read_jedec_id(&mut ctrl)?;
        if manufacturer_id == 0x00 || manufacturer_id == 0xFF {
            log::debug!("no serial flash answered (JEDEC id 0x{:02X})", manufacturer_id);
            return Err(Error::ChipNotSupported);
        }
        log::debug!(
            "JEDEC id: manufacturer 0x{:02X}, device 0x{:04X}",
            manufacturer_id,
            device_id
        );

        let params = sfdp::probe(&mut ctrl)?;
        let size = u32::try_from(params.density_bytes).map_err(|_| {
            log::debug!("density {} bytes is not addressable", params.density_bytes);
            Error::ChipNotSupported
        })?;
        let sector_erase = params.sector_erase().ok_or_else(|| {
            log::debug!("SFDP lists no usable erase type");
            Error::ChipNotSupported
        })?;

        let address_width = if params.four_byte_only {
            AddressWidth::FourByte
        } else {
            AddressWidth::for_density(params.density_bytes)
        };
        if address_width == AddressWidth::FourByte
            && !ctrl.features().contains(SpiFeatures::FOUR_BYTE_ADDR)
        {
            log::debug!("part needs 4-byte addressing, controller lacks it");
            return Err(Error::ChipNotSupported);
        }

        let info = ExternalFlashInfo {
            manufacturer_id,
            device_id,
            size,
            page_size: params.page_size,
            sector_erase,
            address_width,
        };
        log::debug!(
            "serial flash: {} bytes, page {}, sector {} (opcode 0x{:02X}), {}-byte addresses",
            info.size,
            info.page_size,
            info.sector_erase.size,
            info.sector_erase.opcode,
            info.address_width.bytes()
        );

        Ok(Self {
            ctrl,
            info,
            restore_xip: false,
        })
    }

    /// Probed part parameters
    pub fn info(&self) -> &ExternalFlashInfo {
        &self.info
    }

    /// Capacity in bytes
    pub fn size(&self) -> u32 {
        self.info.size
    }

    /// Program granularity (page size)
    pub fn page_size(&self) -> u32 {
        self.info.page_size
    }

    /// Erase granularity (sector size)
    pub fn sector_size(&self) -> u32 {
        self.info.sector_erase.size
    }

    /// Current controller mode
    pub fn mode(&self) -> XipMode {
        if self.ctrl.memory_mode() {
            XipMode::Memory
        } else {
            XipMode::Command
        }
    }

    /// Base address of the XIP window
    pub fn xip_base(&self) -> u32 {
        self.ctrl.memory_base()
    }

    /// Re-enable XIP after a program or erase that had to turn it off
    pub fn set_restore_xip(&mut self, restore: bool) {
        self.restore_xip = restore;
    }

    /// Map the part into the XIP window
    ///
    /// Fails with `ChipNotSupported` on controllers without a memory window.
    pub fn enable_xip(&mut self) -> Result<()> {
        if !self.ctrl.features().contains(SpiFeatures::XIP) {
            log::error!("controller has no XIP window");
            return Err(Error::ChipNotSupported);
        }
        if !self.ctrl.memory_mode() {
            log::debug!("enabling XIP at 0x{:08X}", self.ctrl.memory_base());
            self.ctrl.set_memory_mode(true)?;
        }
        Ok(())
    }

    /// Return the controller to command mode
    pub fn disable_xip(&mut self) -> Result<()> {
        if self.ctrl.memory_mode() {
            log::debug!("disabling XIP");
            self.ctrl.set_memory_mode(false)?;
        }
        Ok(())
    }

    /// Borrow the mapped window
    ///
    /// Fails with `XipInactive` unless XIP is enabled.
    pub fn xip_window(&mut self) -> Result<XipWindow<'_, C>> {
        if !self.ctrl.memory_mode() {
            return Err(Error::XipInactive);
        }
        Ok(XipWindow {
            ctrl: &self.ctrl,
            size: self.info.size,
        })
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<()> {
        if offset as u64 + len as u64 > self.info.size as u64 {
            log::error!(
                "external flash: 0x{:X}+0x{:X} exceeds size 0x{:X}",
                offset,
                len,
                self.info.size
            );
            return Err(Error::OutOfBounds);
        }
        Ok(())
    }

    fn program_mode(&mut self) -> Result<ProgramGuard<'_, C>> {
        let was_mapped = self.ctrl.memory_mode();
        if was_mapped {
            log::warn!("XIP forced off for program/erase");
            self.ctrl.set_memory_mode(false)?;
        }
        Ok(ProgramGuard {
            ctrl: &mut self.ctrl,
            restore: was_mapped && self.restore_xip,
        })
    }

    /// Read bytes at a device offset
    ///
    /// Served from the mapped window in memory mode and with SPI read
    /// commands otherwise.
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        if self.ctrl.memory_mode() {
            self.ctrl.read_mapped(offset, buf)
        } else {
            protocol::read(&mut self.ctrl, self.info.address_width, offset, buf)
        }
    }

    /// Program bytes at a device offset
    ///
    /// The data is split at page boundaries; each piece is one page
    /// program followed by a busy poll. The target must be erased.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        let width = self.info.address_width;
        let page = self.info.page_size as usize;
        let max_write = self.ctrl.max_write_len().max(1);

        let mut guard = self.program_mode()?;
        let mut addr = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let to_page_end = page - (addr as usize % page);
            let len = rest.len().min(to_page_end).min(max_write);
            let (chunk, tail) = rest.split_at(len);
            log::trace!("program page 0x{:08X} ({} bytes)", addr, len);
            protocol::program_page(&mut *guard, width, addr, chunk).inspect_err(|e| {
                log::error!("page program at 0x{:08X} failed: {}", addr, e);
            })?;
            addr += len as u32;
            rest = tail;
        }
        Ok(())
    }

    /// Erase whole sectors at a device offset
    pub fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        let sector = self.info.sector_erase;
        if offset % sector.size != 0 || len % sector.size != 0 {
            log::error!(
                "external flash: erase 0x{:X}+0x{:X} is not sector aligned (0x{:X})",
                offset,
                len,
                sector.size
            );
            return Err(Error::InvalidAlignment);
        }
        self.check_range(offset, len as usize)?;
        let width = self.info.address_width;

        let mut guard = self.program_mode()?;
        let end = offset + len;
        let mut addr = offset;
        while addr < end {
            log::trace!("erase sector 0x{:08X}", addr);
            protocol::erase_sector(&mut *guard, width, sector.opcode, addr).inspect_err(|e| {
                log::error!("sector erase at 0x{:08X} failed: {}", addr, e);
            })?;
            addr += sector.size;
        }
        Ok(())
    }

    /// Access the controller
    pub fn controller(&self) -> &C {
        &self.ctrl
    }

    /// Mutable access to the controller
    ///
    /// Switching modes behind the adapter's back is allowed; every
    /// operation checks the controller's current mode.
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.ctrl
    }

    /// Give the controller back
    pub fn into_controller(self) -> C {
        self.ctrl
    }

    /// Shut the controller down before the bus is handed to the next stage
    pub fn deinit(mut self) -> C {
        log::debug!("QSPI controller deinitialized");
        self.ctrl.deinit();
        self.ctrl
    }
}

/// Command-mode acquisition for one program or erase
///
/// Dereferences to the controller. On drop, memory mode is turned back on
/// if it was on before and restoring was requested.
pub struct ProgramGuard<'a, C: QspiController> {
    ctrl: &'a mut C,
    restore: bool,
}

impl<C: QspiController> Deref for ProgramGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctrl
    }
}

impl<C: QspiController> DerefMut for ProgramGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctrl
    }
}

impl<C: QspiController> Drop for ProgramGuard<'_, C> {
    fn drop(&mut self) {
        if self.restore {
            log::debug!("restoring XIP");
            if let Err(e) = self.ctrl.set_memory_mode(true) {
                log::error!("failed to restore XIP: {}", e);
            }
        }
    }
}

/// Proof that the serial flash is mapped
///
/// Holds the adapter's mutable borrow, so program and erase are
/// unreachable while the window exists.
pub struct XipWindow<'a, C: QspiController> {
    ctrl: &'a C,
    size: u32,
}

impl<C: QspiController> XipWindow<'_, C> {
    /// Address the device is mapped at
    pub fn base(&self) -> u32 {
        self.ctrl.memory_base()
    }

    /// Read mapped bytes at a device offset
    pub fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        if offset as u64 + buf.len() as u64 > self.size as u64 {
            return Err(Error::OutOfBounds);
        }
        self.ctrl.read_mapped(offset, buf)
    }

    /// Read part of a resource blob
    ///
    /// `offset` is relative to the blob start and the read must stay inside
    /// the blob.
    pub fn read_resource(
        &self,
        handle: &ResourceHandle,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<()> {
        if offset as u64 + buf.len() as u64 > handle.size as u64 {
            return Err(Error::OutOfBounds);
        }
        let device_offset = handle
            .address
            .checked_sub(self.base())
            .and_then(|o| o.checked_add(offset))
            .ok_or(Error::OutOfBounds)?;
        self.read(device_offset, buf)
    }
}
