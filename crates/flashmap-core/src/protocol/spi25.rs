//! SPI25 protocol implementation
//!
//! This module implements the JEDEC serial NOR command sequences the
//! external flash adapter needs: identification, SFDP, read, page program
//! and sector erase.
//!
//! Program and erase block until the part reports completion. There is no
//! timeout: a part that never clears WIP is a hardware fault.

use crate::error::{Error, Result};
use crate::spi::{opcodes, AddressWidth, SpiCommand, SpiMaster};

/// Status polling interval for page program (typical 0.3-2 ms)
const PROGRAM_POLL_US: u32 = 10;

/// Status polling interval for sector erase (typical 0.5-2 s for 256 KiB)
const ERASE_POLL_US: u32 = 10_000;

/// Read the JEDEC ID from a flash chip
///
/// Returns (manufacturer_id, device_id) on success.
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;

    let manufacturer = buf[0];
    let device = ((buf[1] as u16) << 8) | (buf[2] as u16);

    Ok((manufacturer, device))
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Send the Write Enable command
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)
}

/// Clear the latched program/erase error bits
pub fn clear_status<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::CLSR);
    master.execute(&mut cmd)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Polls the status register every `poll_delay_us` until the part is idle
/// and returns the final status value.
pub fn wait_ready<M: SpiMaster + ?Sized>(master: &mut M, poll_delay_us: u32) -> Result<u8> {
    loop {
        let status = read_status1(master)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(status);
        }
        master.delay_us(poll_delay_us);
    }
}

/// Read data from flash
///
/// Splits the read into transactions of at most `max_read_len()` bytes.
pub fn read<M: SpiMaster + ?Sized>(
    master: &mut M,
    width: AddressWidth,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    let opcode = match width {
        AddressWidth::FourByte => opcodes::READ_4B,
        _ => opcodes::READ,
    };
    let max_len = master.max_read_len();
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read(opcode, width, addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

/// Program a single page (up to page_size bytes)
///
/// The data must not cross a page boundary.
pub fn program_page<M: SpiMaster + ?Sized>(
    master: &mut M,
    width: AddressWidth,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    let opcode = match width {
        AddressWidth::FourByte => opcodes::PP_4B,
        _ => opcodes::PP,
    };

    write_enable(master)?;
    let mut cmd = SpiCommand::write(opcode, width, addr, data);
    master.execute(&mut cmd)?;

    let status = wait_ready(master, PROGRAM_POLL_US)?;
    if status & opcodes::SR1_P_ERR != 0 {
        clear_status(master)?;
        return Err(Error::ProgramFailed { addr });
    }
    Ok(())
}

/// Erase one sector/block at the given address
///
/// `opcode` is the 3-byte address form; it is promoted to the native
/// 4-byte opcode when `width` is `FourByte`.
pub fn erase_sector<M: SpiMaster + ?Sized>(
    master: &mut M,
    width: AddressWidth,
    opcode: u8,
    addr: u32,
) -> Result<()> {
    let opcode = match width {
        AddressWidth::FourByte => opcodes::to_4byte(opcode),
        _ => opcode,
    };

    write_enable(master)?;
    let mut cmd = SpiCommand::erase(opcode, width, addr);
    master.execute(&mut cmd)?;

    let status = wait_ready(master, ERASE_POLL_US)?;
    if status & opcodes::SR1_E_ERR != 0 {
        clear_status(master)?;
        return Err(Error::EraseFailed { addr });
    }
    Ok(())
}

/// Send software reset sequence
pub fn software_reset<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::RSTEN);
    master.execute(&mut cmd)?;
    master.delay_us(50);
    let mut cmd = SpiCommand::simple(opcodes::RST);
    master.execute(&mut cmd)?;
    master.delay_us(100);
    Ok(())
}

/// Read SFDP (Serial Flash Discoverable Parameters)
pub fn read_sfdp<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    let max_read = master.max_read_len();
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_read, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read_sfdp(addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}
