//! Protocol implementations
//!
//! This module contains the SPI25 command sequences used to drive the
//! external serial flash.

mod spi25;

pub use spi25::*;
