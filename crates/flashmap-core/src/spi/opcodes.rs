//! Serial NOR flash opcodes used by the external flash adapter
//!
//! Standard JEDEC opcodes plus the Spansion/Infineon status bits that
//! report program and erase failures.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Clear Status Register (clears P_ERR / E_ERR)
pub const CLSR: u8 = 0x30;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;
/// Read SFDP (JEDEC JESD216)
pub const RDSFDP: u8 = 0x5A;

// ============================================================================
// Read
// ============================================================================

/// Read Data with 3-byte address
pub const READ: u8 = 0x03;
/// Read Data with 4-byte address
pub const READ_4B: u8 = 0x13;

// ============================================================================
// Page Program
// ============================================================================

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;

// ============================================================================
// Erase
// ============================================================================

/// Sector Erase 4KB with 3-byte address
pub const SE_20: u8 = 0x20;
/// Sector Erase 4KB with 4-byte address
pub const SE_21: u8 = 0x21;
/// Block/Sector Erase (64KB or 256KB uniform sector) with 3-byte address
pub const BE_D8: u8 = 0xD8;
/// Block/Sector Erase (64KB or 256KB uniform sector) with 4-byte address
pub const BE_DC: u8 = 0xDC;

// ============================================================================
// Software Reset
// ============================================================================

/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device
pub const RST: u8 = 0x99;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
/// Status Register 1: Erase Error (Spansion/Infineon)
pub const SR1_E_ERR: u8 = 0x20;
/// Status Register 1: Program Error (Spansion/Infineon)
pub const SR1_P_ERR: u8 = 0x40;

/// Map a 3-byte address opcode to its native 4-byte address variant
pub const fn to_4byte(opcode: u8) -> u8 {
    match opcode {
        READ => READ_4B,
        PP => PP_4B,
        SE_20 => SE_21,
        BE_D8 => BE_DC,
        other => other,
    }
}
