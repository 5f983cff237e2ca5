//! PSoC 6 on-chip flash through the vendor peripheral driver library
//!
//! Only built with the `pdl` feature, when linking against the vendor
//! driver library on target.

use core::ptr;

use super::internal::RowFlash;
use crate::board::{INTERNAL_FLASH_BASE, INTERNAL_FLASH_SIZE, INTERNAL_ROW_SIZE};
use crate::error::{Error, Result};

/// `CY_FLASH_DRV_SUCCESS`
const FLASH_DRV_SUCCESS: u32 = 0;

extern "C" {
    fn Cy_Flash_WriteRow(row_addr: u32, data: *const u32) -> u32;
    fn Cy_Flash_EraseRow(row_addr: u32) -> u32;
}

/// On-chip flash rows programmed through `Cy_Flash_WriteRow`
#[derive(Debug)]
pub struct Psoc6Flash {
    row: [u32; INTERNAL_ROW_SIZE as usize / 4],
}

impl Psoc6Flash {
    /// Create the row flash binding
    pub const fn new() -> Self {
        Self {
            row: [0; INTERNAL_ROW_SIZE as usize / 4],
        }
    }
}

impl Default for Psoc6Flash {
    fn default() -> Self {
        Self::new()
    }
}

impl RowFlash for Psoc6Flash {
    fn row_size(&self) -> u32 {
        INTERNAL_ROW_SIZE
    }

    fn base(&self) -> u32 {
        INTERNAL_FLASH_BASE
    }

    fn size(&self) -> u32 {
        INTERNAL_FLASH_SIZE
    }

    fn program_row(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.len() != INTERNAL_ROW_SIZE as usize {
            return Err(Error::InvalidAlignment);
        }
        // The driver wants word-aligned row data
        for (word, bytes) in self.row.iter_mut().zip(data.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        // SAFETY: the row buffer is INTERNAL_ROW_SIZE bytes and outlives the
        // blocking call; addr is a row address inside the on-chip flash.
        let status = unsafe { Cy_Flash_WriteRow(addr, self.row.as_ptr()) };
        if status != FLASH_DRV_SUCCESS {
            return Err(Error::ProgramFailed { addr });
        }
        Ok(())
    }

    fn erase_row(&mut self, addr: u32) -> Result<()> {
        // SAFETY: blocking call on a row address inside the on-chip flash
        let status = unsafe { Cy_Flash_EraseRow(addr) };
        if status != FLASH_DRV_SUCCESS {
            return Err(Error::EraseFailed { addr });
        }
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        for (i, byte) in buf.iter_mut().enumerate() {
            // SAFETY: the range was checked against the flash size by the caller
            *byte = unsafe { ptr::read_volatile((addr as usize + i) as *const u8) };
        }
        Ok(())
    }
}
