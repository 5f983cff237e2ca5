//! flashmap-core - Flash area layer for a dual-flash MCUboot port
//!
//! This crate lets an image verification engine treat the on-chip flash and
//! an external QSPI serial flash as one set of named, erasable, writable
//! areas, and performs the one-shot handoff to a verified image. It is
//! `no_std` compatible for use in the boot stage itself.
//!
//! # Features
//!
//! - `std` - Enable standard library support and TOML board files
//! - `pdl` - Bind the on-chip flash row primitives of the vendor driver library
//!
//! # Example
//!
//! ```ignore
//! use flashmap_core::{board::BoardLayout, FlashBackend, FlashMap, Registry};
//!
//! let registry = Registry::from_board(&BoardLayout::DEFAULT)?;
//! let external = ExternalFlash::probe(qspi)?;
//! let mut map = FlashMap::new(&registry, InternalFlash::new(rows), external);
//! let area = map.open(AreaId::Secondary(ImageIndex::FIRST))?;
//! map.erase(&area, 0, map.sector_size(area.device)?)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod area;
pub mod backend;
pub mod board;
pub mod boot;
#[cfg(feature = "std")]
pub mod config;
pub mod driver;
pub mod error;
pub mod ops;
pub mod protocol;
pub mod radio;
pub mod registry;
pub mod sfdp;
pub mod slot;
pub mod spi;

pub use area::{AreaId, FlashArea, FlashDevice, FlashSector};
pub use backend::FlashBackend;
pub use error::{Error, Result};
pub use ops::FlashMap;
pub use registry::Registry;
pub use slot::{ImageIndex, SlotRole};
