//! Simulated on-chip row flash

use flashmap_core::board::{INTERNAL_FLASH_BASE, INTERNAL_FLASH_SIZE, INTERNAL_ROW_SIZE};
use flashmap_core::driver::RowFlash;
use flashmap_core::error::{Error, Result};

/// Geometry of the simulated on-chip flash
#[derive(Debug, Clone, Copy)]
pub struct SimRowFlashConfig {
    /// Memory-mapped base address
    pub base: u32,
    /// Capacity in bytes
    pub size: u32,
    /// Row size in bytes
    pub row_size: u32,
}

impl Default for SimRowFlashConfig {
    fn default() -> Self {
        Self {
            base: INTERNAL_FLASH_BASE,
            size: INTERNAL_FLASH_SIZE,
            row_size: INTERNAL_ROW_SIZE,
        }
    }
}

/// Row flash that erases to 0x00 and counts every row operation
pub struct SimRowFlash {
    config: SimRowFlashConfig,
    data: Vec<u8>,
    program_counts: Vec<u32>,
    erase_counts: Vec<u32>,
    fail_program_at: Option<u32>,
    fail_erase_at: Option<u32>,
}

impl SimRowFlash {
    /// Create an erased flash
    pub fn new(config: SimRowFlashConfig) -> Self {
        let rows = (config.size / config.row_size) as usize;
        Self {
            config,
            data: vec![0x00; config.size as usize],
            program_counts: vec![0; rows],
            erase_counts: vec![0; rows],
            fail_program_at: None,
            fail_erase_at: None,
        }
    }

    /// Create an erased flash with the board's geometry
    pub fn new_default() -> Self {
        Self::new(SimRowFlashConfig::default())
    }

    /// Raw contents, offset 0 is the base address
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// How often the row at absolute `addr` was programmed
    pub fn program_count(&self, addr: u32) -> u32 {
        self.row_index(addr)
            .map(|row| self.program_counts[row])
            .unwrap_or(0)
    }

    /// How often the row at absolute `addr` was erased
    pub fn erase_count(&self, addr: u32) -> u32 {
        self.row_index(addr)
            .map(|row| self.erase_counts[row])
            .unwrap_or(0)
    }

    /// Total number of row programs
    pub fn total_programs(&self) -> u32 {
        self.program_counts.iter().sum()
    }

    /// Total number of row erases
    pub fn total_erases(&self) -> u32 {
        self.erase_counts.iter().sum()
    }

    /// Make the row program at absolute `addr` fail
    pub fn fail_program_at(&mut self, addr: Option<u32>) {
        self.fail_program_at = addr;
    }

    /// Make the row erase at absolute `addr` fail
    pub fn fail_erase_at(&mut self, addr: Option<u32>) {
        self.fail_erase_at = addr;
    }

    fn row_index(&self, addr: u32) -> Option<usize> {
        let offset = addr.checked_sub(self.config.base)?;
        if offset >= self.config.size {
            return None;
        }
        Some((offset / self.config.row_size) as usize)
    }

    fn row_start(&self, addr: u32) -> Result<usize> {
        if addr.wrapping_sub(self.config.base) % self.config.row_size != 0 {
            return Err(Error::InvalidAlignment);
        }
        let row = self.row_index(addr).ok_or(Error::OutOfBounds)?;
        Ok(row * self.config.row_size as usize)
    }
}

impl RowFlash for SimRowFlash {
    fn row_size(&self) -> u32 {
        self.config.row_size
    }

    fn base(&self) -> u32 {
        self.config.base
    }

    fn size(&self) -> u32 {
        self.config.size
    }

    fn program_row(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.len() != self.config.row_size as usize {
            return Err(Error::InvalidAlignment);
        }
        let start = self.row_start(addr)?;
        if self.fail_program_at == Some(addr) {
            log::debug!("sim: injected program failure at 0x{:08X}", addr);
            return Err(Error::ProgramFailed { addr });
        }
        self.data[start..start + data.len()].copy_from_slice(data);
        self.program_counts[start / self.config.row_size as usize] += 1;
        Ok(())
    }

    fn erase_row(&mut self, addr: u32) -> Result<()> {
        let start = self.row_start(addr)?;
        if self.fail_erase_at == Some(addr) {
            log::debug!("sim: injected erase failure at 0x{:08X}", addr);
            return Err(Error::EraseFailed { addr });
        }
        let end = start + self.config.row_size as usize;
        self.data[start..end].fill(0x00);
        self.erase_counts[start / self.config.row_size as usize] += 1;
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let start = addr
            .checked_sub(self.config.base)
            .ok_or(Error::OutOfBounds)? as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(Error::OutOfBounds);
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}
