//! Simulated QSPI controller with a serial NOR part
//!
//! The part answers JEDEC ID, SFDP, status, read, page program and sector
//! erase commands. Storage is allocated per sector on first program, so a
//! full 64 MiB part costs nothing until it is written.

use std::collections::BTreeMap;

use flashmap_core::board::{EXTERNAL_FLASH_SIZE, EXTERNAL_SECTOR_SIZE, EXTERNAL_XIP_BASE};
use flashmap_core::error::{Error, Result};
use flashmap_core::spi::{opcodes, AddressWidth, QspiController, SpiCommand, SpiFeatures, SpiMaster};

const SFDP_BFPT_POINTER: usize = 0x10;
const SFDP_BFPT_DWORDS: usize = 16;

/// Configuration for the simulated serial flash
#[derive(Debug, Clone)]
pub struct SimQspiConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: u32,
    /// Page size for programming
    pub page_size: u32,
    /// Uniform sector size
    pub sector_size: u32,
    /// Sector erase opcode (3-byte address form)
    pub erase_opcode: u8,
    /// Address the XIP window maps the part at
    pub memory_base: u32,
    /// Status polls reporting WIP after every program or erase
    pub busy_polls: u32,
    /// Whether the controller supports 4-byte addresses
    pub four_byte_addr: bool,
}

impl Default for SimQspiConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0x01, // Spansion/Infineon
            device_id: 0x0220,     // S25FL512S
            size: EXTERNAL_FLASH_SIZE,
            page_size: 512,
            sector_size: EXTERNAL_SECTOR_SIZE,
            erase_opcode: opcodes::BE_D8,
            memory_base: EXTERNAL_XIP_BASE,
            busy_polls: 2,
            four_byte_addr: true,
        }
    }
}

/// QSPI controller emulator
pub struct SimQspi {
    config: SimQspiConfig,
    sectors: BTreeMap<u32, Vec<u8>>,
    sfdp: Vec<u8>,
    write_enabled: bool,
    error_bits: u8,
    busy_remaining: u32,
    memory_mode: bool,
    powered_down: bool,
    mode_switches: u32,
    page_programs: u32,
    sector_erases: u32,
    fail_program_at: Option<u32>,
    fail_erase_at: Option<u32>,
}

impl SimQspi {
    /// Create an erased part
    pub fn new(config: SimQspiConfig) -> Self {
        let sfdp = build_sfdp(&config);
        Self {
            config,
            sectors: BTreeMap::new(),
            sfdp,
            write_enabled: false,
            error_bits: 0,
            busy_remaining: 0,
            memory_mode: false,
            powered_down: false,
            mode_switches: 0,
            page_programs: 0,
            sector_erases: 0,
            fail_program_at: None,
            fail_erase_at: None,
        }
    }

    /// Create an erased part shaped like the board's S25FL512S
    pub fn new_default() -> Self {
        Self::new(SimQspiConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &SimQspiConfig {
        &self.config
    }

    /// Number of memory mode switches so far
    pub fn mode_switches(&self) -> u32 {
        self.mode_switches
    }

    /// Number of page programs accepted
    pub fn page_programs(&self) -> u32 {
        self.page_programs
    }

    /// Number of sector erases accepted
    pub fn sector_erases(&self) -> u32 {
        self.sector_erases
    }

    /// Whether the controller was shut down
    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    /// Make the program touching device offset `addr` report P_ERR
    pub fn fail_program_at(&mut self, addr: Option<u32>) {
        self.fail_program_at = addr;
    }

    /// Make the erase of the sector at device offset `addr` report E_ERR
    pub fn fail_erase_at(&mut self, addr: Option<u32>) {
        self.fail_erase_at = addr;
    }

    /// Copy raw contents, bypassing the command path
    pub fn peek(&self, offset: u32, buf: &mut [u8]) {
        let sector = self.config.sector_size;
        for (i, byte) in buf.iter_mut().enumerate() {
            let addr = offset + i as u32;
            *byte = self
                .sectors
                .get(&(addr / sector))
                .map(|data| data[(addr % sector) as usize])
                .unwrap_or(0xFF);
        }
    }

    /// Store raw contents, bypassing the command path
    pub fn poke(&mut self, offset: u32, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            *self.byte_mut(offset + i as u32) = byte;
        }
    }

    fn byte_mut(&mut self, addr: u32) -> &mut u8 {
        let sector = self.config.sector_size;
        let data = self
            .sectors
            .entry(addr / sector)
            .or_insert_with(|| vec![0xFF; sector as usize]);
        &mut data[(addr % sector) as usize]
    }

    fn check_width(&self, cmd: &SpiCommand<'_>, four_byte_opcode: bool) -> Result<u32> {
        let expected = if four_byte_opcode {
            AddressWidth::FourByte
        } else {
            AddressWidth::ThreeByte
        };
        if cmd.address_width != expected {
            log::debug!(
                "sim: opcode 0x{:02X} sent with {:?} address",
                cmd.opcode,
                cmd.address_width
            );
            return Err(Error::SpiTransferFailed);
        }
        let addr = cmd.address.ok_or(Error::SpiTransferFailed)?;
        if addr > cmd.address_width.max_size().saturating_sub(1) {
            return Err(Error::SpiTransferFailed);
        }
        Ok(addr)
    }

    fn status(&mut self) -> u8 {
        let mut status = self.error_bits;
        if self.write_enabled {
            status |= opcodes::SR1_WEL;
        }
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            status |= opcodes::SR1_WIP;
        }
        status
    }

    fn handle_read(&mut self, cmd: &mut SpiCommand<'_>, four_byte: bool) -> Result<()> {
        let addr = self.check_width(cmd, four_byte)?;
        if addr as u64 + cmd.read_buf.len() as u64 > self.config.size as u64 {
            return Err(Error::SpiTransferFailed);
        }
        self.peek(addr, cmd.read_buf);
        Ok(())
    }

    fn handle_page_program(&mut self, cmd: &SpiCommand<'_>, four_byte: bool) -> Result<()> {
        let addr = self.check_width(cmd, four_byte)?;
        if !self.write_enabled {
            log::debug!("sim: page program without WREN ignored");
            return Ok(());
        }
        self.write_enabled = false;

        let data = cmd.write_data;
        if data.is_empty() {
            return Ok(());
        }
        let page = self.config.page_size;
        if addr / page != (addr + data.len() as u32 - 1) / page {
            log::debug!("sim: page program at 0x{:08X} crosses a page", addr);
            return Err(Error::SpiTransferFailed);
        }
        if addr as u64 + data.len() as u64 > self.config.size as u64 {
            return Err(Error::SpiTransferFailed);
        }

        self.busy_remaining = self.config.busy_polls;
        let end = addr + data.len() as u32;
        if let Some(fail) = self.fail_program_at {
            if (addr..end).contains(&fail) {
                self.error_bits |= opcodes::SR1_P_ERR;
                return Ok(());
            }
        }

        // Flash programming: can only change 1 -> 0
        for (i, &byte) in data.iter().enumerate() {
            *self.byte_mut(addr + i as u32) &= byte;
        }
        self.page_programs += 1;
        Ok(())
    }

    fn handle_sector_erase(&mut self, cmd: &SpiCommand<'_>, four_byte: bool) -> Result<()> {
        let addr = self.check_width(cmd, four_byte)?;
        if !self.write_enabled {
            log::debug!("sim: sector erase without WREN ignored");
            return Ok(());
        }
        self.write_enabled = false;

        let sector = self.config.sector_size;
        if addr >= self.config.size {
            return Err(Error::SpiTransferFailed);
        }

        self.busy_remaining = self.config.busy_polls;
        let start = addr - addr % sector;
        if self.fail_erase_at == Some(start) {
            self.error_bits |= opcodes::SR1_E_ERR;
            return Ok(());
        }

        // Erase sets all bytes to 0xFF
        self.sectors.remove(&(start / sector));
        self.sector_erases += 1;
        Ok(())
    }

    fn handle_sfdp(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let addr = cmd.address.ok_or(Error::SpiTransferFailed)? as usize;
        for (i, byte) in cmd.read_buf.iter_mut().enumerate() {
            *byte = self.sfdp.get(addr + i).copied().unwrap_or(0xFF);
        }
        Ok(())
    }
}

impl SpiMaster for SimQspi {
    fn features(&self) -> SpiFeatures {
        let mut features = SpiFeatures::XIP;
        if self.config.four_byte_addr {
            features |= SpiFeatures::FOUR_BYTE_ADDR;
        }
        features
    }

    fn max_read_len(&self) -> usize {
        4096
    }

    fn max_write_len(&self) -> usize {
        self.config.page_size as usize
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        if self.powered_down {
            return Err(Error::SpiTransferFailed);
        }
        if self.memory_mode {
            return Err(Error::XipActive);
        }
        let erase_3b = self.config.erase_opcode;
        let erase_4b = opcodes::to_4byte(erase_3b);

        match cmd.opcode {
            // JEDEC ID
            opcodes::RDID => {
                if cmd.read_buf.len() >= 3 {
                    cmd.read_buf[0] = self.config.manufacturer_id;
                    cmd.read_buf[1] = (self.config.device_id >> 8) as u8;
                    cmd.read_buf[2] = self.config.device_id as u8;
                }
                Ok(())
            }
            opcodes::RDSFDP => self.handle_sfdp(cmd),

            // Status register
            opcodes::RDSR => {
                let status = self.status();
                if let Some(byte) = cmd.read_buf.first_mut() {
                    *byte = status;
                }
                Ok(())
            }
            opcodes::CLSR => {
                self.error_bits = 0;
                Ok(())
            }

            // Write enable/disable
            opcodes::WREN => {
                self.write_enabled = true;
                Ok(())
            }
            opcodes::WRDI => {
                self.write_enabled = false;
                Ok(())
            }

            opcodes::READ => self.handle_read(cmd, false),
            opcodes::READ_4B => self.handle_read(cmd, true),
            opcodes::PP => self.handle_page_program(cmd, false),
            opcodes::PP_4B => self.handle_page_program(cmd, true),
            op if op == erase_3b => self.handle_sector_erase(cmd, false),
            op if op == erase_4b => self.handle_sector_erase(cmd, true),

            // Software reset
            opcodes::RSTEN | opcodes::RST => {
                self.write_enabled = false;
                self.error_bits = 0;
                Ok(())
            }

            other => {
                log::debug!("sim: unsupported opcode 0x{:02X}", other);
                Err(Error::SpiTransferFailed)
            }
        }
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

impl QspiController for SimQspi {
    fn set_memory_mode(&mut self, enabled: bool) -> Result<()> {
        if self.powered_down {
            return Err(Error::SpiTransferFailed);
        }
        if self.memory_mode != enabled {
            self.memory_mode = enabled;
            self.mode_switches += 1;
        }
        Ok(())
    }

    fn memory_mode(&self) -> bool {
        self.memory_mode
    }

    fn memory_base(&self) -> u32 {
        self.config.memory_base
    }

    fn read_mapped(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        if !self.memory_mode {
            return Err(Error::XipInactive);
        }
        if offset as u64 + buf.len() as u64 > self.config.size as u64 {
            return Err(Error::OutOfBounds);
        }
        self.peek(offset, buf);
        Ok(())
    }

    fn deinit(&mut self) {
        self.memory_mode = false;
        self.powered_down = true;
    }
}

/// Build an SFDP table with a single Basic Flash Parameter Table
fn build_sfdp(config: &SimQspiConfig) -> Vec<u8> {
    let mut table = vec![0u8; SFDP_BFPT_POINTER + SFDP_BFPT_DWORDS * 4];

    // Header: "SFDP", revision 1.6, one parameter header
    table[0..4].copy_from_slice(b"SFDP");
    table[4] = 0x06;
    table[5] = 0x01;
    table[6] = 0x00;
    table[7] = 0xFF;

    // Parameter header 0: BFPT
    table[8] = 0x00;
    table[9] = 0x06;
    table[10] = 0x01;
    table[11] = SFDP_BFPT_DWORDS as u8;
    table[12..15].copy_from_slice(&(SFDP_BFPT_POINTER as u32).to_le_bytes()[..3]);
    table[15] = 0xFF;

    let mut dwords = [0u32; SFDP_BFPT_DWORDS];
    // DWORD 1: 3- or 4-byte addressing
    dwords[0] = 0b01 << 17;
    // DWORD 2: density in bits
    let bits = config.size as u64 * 8;
    dwords[1] = if bits <= 1 << 31 {
        (bits - 1) as u32
    } else {
        (1 << 31) | bits.trailing_zeros()
    };
    // DWORD 8/9: one erase type, the rest unsupported
    dwords[7] = (config.sector_size.trailing_zeros())
        | ((config.erase_opcode as u32) << 8)
        | (0xFF << 24);
    dwords[8] = (0xFF << 8) | (0xFF << 24);
    // DWORD 11: page size exponent
    dwords[10] = config.page_size.trailing_zeros() << 4;

    for (i, dword) in dwords.iter().enumerate() {
        let at = SFDP_BFPT_POINTER + i * 4;
        table[at..at + 4].copy_from_slice(&dword.to_le_bytes());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashmap_core::{protocol, sfdp};

    #[test]
    fn test_read_jedec_id() {
        let mut flash = SimQspi::new_default();
        let (mfr, dev) = protocol::read_jedec_id(&mut flash).unwrap();
        assert_eq!(mfr, 0x01);
        assert_eq!(dev, 0x0220);
    }

    #[test]
    fn test_sfdp_describes_part() {
        let mut flash = SimQspi::new_default();
        let params = sfdp::probe(&mut flash).unwrap();
        assert_eq!(params.density_bytes, 64 * 1024 * 1024);
        assert_eq!(params.page_size, 512);
        let erase = params.sector_erase().unwrap();
        assert_eq!(erase.size, 0x40000);
        assert_eq!(erase.opcode, opcodes::BE_D8);
        assert!(!params.four_byte_only);
    }

    #[test]
    fn test_program_then_erase() {
        let mut flash = SimQspi::new_default();
        let width = AddressWidth::FourByte;
        let data = [0x12, 0x34, 0x56, 0x78];
        protocol::program_page(&mut flash, width, 0x1000, &data).unwrap();

        let mut buf = [0u8; 4];
        protocol::read(&mut flash, width, 0x1000, &mut buf).unwrap();
        assert_eq!(buf, data);

        protocol::erase_sector(&mut flash, width, opcodes::BE_D8, 0).unwrap();
        protocol::read(&mut flash, width, 0x1000, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
        assert_eq!(flash.sector_erases(), 1);
    }

    #[test]
    fn test_program_error_bit() {
        let mut flash = SimQspi::new_default();
        flash.fail_program_at(Some(0x200));
        let err = protocol::program_page(&mut flash, AddressWidth::FourByte, 0x200, &[0; 16]);
        assert_eq!(err, Err(Error::ProgramFailed { addr: 0x200 }));
        // CLSR cleared the latched error
        assert_eq!(protocol::read_status1(&mut flash).unwrap() & opcodes::SR1_P_ERR, 0);
    }

    #[test]
    fn test_commands_rejected_in_memory_mode() {
        let mut flash = SimQspi::new_default();
        flash.set_memory_mode(true).unwrap();
        assert_eq!(protocol::read_jedec_id(&mut flash), Err(Error::XipActive));

        flash.poke(0x10, &[0xAB]);
        let mut buf = [0u8; 1];
        flash.read_mapped(0x10, &mut buf).unwrap();
        assert_eq!(buf, [0xAB]);

        flash.set_memory_mode(false).unwrap();
        assert_eq!(flash.read_mapped(0x10, &mut buf), Err(Error::XipInactive));
    }

    #[test]
    fn test_program_without_wren_is_ignored() {
        let mut flash = SimQspi::new_default();
        let mut cmd = SpiCommand::write(opcodes::PP_4B, AddressWidth::FourByte, 0, &[0x00]);
        flash.execute(&mut cmd).unwrap();
        let mut buf = [0u8; 1];
        flash.peek(0, &mut buf);
        assert_eq!(buf, [0xFF]);
    }
}
