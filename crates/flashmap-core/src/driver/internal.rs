//! On-chip flash adapter
//!
//! The on-chip flash is programmed and erased one row at a time through a
//! blocking primitive and read directly through its memory mapping.
//! [`InternalFlash`] adds range checks and the row loops on top of a
//! [`RowFlash`] implementation.

use crate::error::{Error, Result};

/// Blocking row-granular flash primitives
///
/// Addresses are absolute (memory-mapped) addresses. The caller must keep
/// interrupts and power state compatible with the flash controller while a
/// row operation runs.
pub trait RowFlash {
    /// Row size in bytes; program and erase unit
    fn row_size(&self) -> u32;

    /// Memory-mapped base address of the flash
    fn base(&self) -> u32;

    /// Flash capacity in bytes
    fn size(&self) -> u32;

    /// Program exactly one row at a row-aligned address
    ///
    /// `data` is exactly `row_size()` bytes long.
    fn program_row(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase exactly one row at a row-aligned address
    fn erase_row(&mut self, addr: u32) -> Result<()>;

    /// Copy bytes out of the memory mapping
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()>;
}

/// Row loop and range checking over a [`RowFlash`]
#[derive(Debug)]
pub struct InternalFlash<F> {
    flash: F,
}

impl<F: RowFlash> InternalFlash<F> {
    /// Wrap a row flash implementation
    pub fn new(flash: F) -> Self {
        Self { flash }
    }

    /// Access the underlying row flash
    pub fn inner(&self) -> &F {
        &self.flash
    }

    /// Mutable access to the underlying row flash
    pub fn inner_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Consume the adapter
    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Row size in bytes
    pub fn row_size(&self) -> u32 {
        self.flash.row_size()
    }

    /// Memory-mapped base address
    pub fn base(&self) -> u32 {
        self.flash.base()
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<u32> {
        let end = offset as u64 + len as u64;
        if end > self.flash.size() as u64 {
            log::error!(
                "internal flash: 0x{:X}+0x{:X} exceeds size 0x{:X}",
                offset,
                len,
                self.flash.size()
            );
            return Err(Error::OutOfBounds);
        }
        Ok(self.flash.base() + offset)
    }

    fn check_rows(&self, offset: u32, len: usize) -> Result<()> {
        let row = self.flash.row_size() as usize;
        if offset as usize % row != 0 || len % row != 0 {
            log::error!(
                "internal flash: 0x{:X}+0x{:X} is not row aligned (row 0x{:X})",
                offset,
                len,
                row
            );
            return Err(Error::InvalidAlignment);
        }
        Ok(())
    }

    /// Read `buf.len()` bytes at a device offset
    pub fn read(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        let addr = self.check_range(offset, buf.len())?;
        self.flash.read(addr, buf)
    }

    /// Program whole rows at a device offset
    ///
    /// Rows are written in ascending address order. The first failing row
    /// aborts the write; rows before it stay programmed.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.check_rows(offset, data.len())?;
        let mut addr = self.check_range(offset, data.len())?;

        for row in data.chunks_exact(self.flash.row_size() as usize) {
            log::trace!("program row 0x{:08X}", addr);
            self.flash.program_row(addr, row).inspect_err(|e| {
                log::error!("row program at 0x{:08X} failed: {}", addr, e);
            })?;
            addr += row.len() as u32;
        }
        Ok(())
    }

    /// Erase whole rows at a device offset
    ///
    /// Rows are erased from the highest address down.
    pub fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        self.check_rows(offset, len as usize)?;
        let start = self.check_range(offset, len as usize)?;
        let row = self.flash.row_size();

        let mut remaining = len;
        while remaining > 0 {
            remaining -= row;
            let addr = start + remaining;
            log::trace!("erase row 0x{:08X}", addr);
            self.flash.erase_row(addr).inspect_err(|e| {
                log::error!("row erase at 0x{:08X} failed: {}", addr, e);
            })?;
        }
        Ok(())
    }
}
