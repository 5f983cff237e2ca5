//! SPI types and command structures
//!
//! This module provides types for representing SPI transactions, the
//! controller traits and the JEDEC opcodes used by the external flash.

mod address;
mod command;
mod master;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::SpiCommand;
pub use master::{QspiController, SpiFeatures, SpiMaster};
