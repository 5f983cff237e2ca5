//! SFDP (Serial Flash Discoverable Parameters) parsing
//!
//! The external flash adapter does not carry a part database. Density,
//! program page size and the sector erase opcode are discovered from the
//! Basic Flash Parameter Table at probe time.

mod parser;
mod types;

pub use parser::*;
pub use types::*;
