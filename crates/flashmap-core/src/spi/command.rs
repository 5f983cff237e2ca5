//! SPI command structure

use super::{opcodes, AddressWidth};

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Number of dummy cycles after address
    pub dummy_cycles: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed read command
    pub fn read(opcode: u8, width: AddressWidth, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create an addressed program command (e.g., PP)
    pub fn write(opcode: u8, width: AddressWidth, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            dummy_cycles: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an addressed erase command
    pub fn erase(opcode: u8, width: AddressWidth, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create an SFDP read (always 3-byte address, 8 dummy cycles)
    pub fn read_sfdp(addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            dummy_cycles: 8,
            ..Self::read(opcodes::RDSFDP, AddressWidth::ThreeByte, addr, buf)
        }
    }
}
