//! # SlotStore — crash-tolerant slot storage for tiny NVM
//!
//! A storage engine for small byte-addressable non-volatile memory:
//! microcontroller EEPROM, battery-backed SRAM, or anything else in the
//! hundreds-of-bytes to tens-of-kilobytes range. Hosts store, replace and
//! erase up to 250 independently addressable **slots** of 1..=256 payload
//! bytes each.
//!
//! ## Guarantees
//!
//! - **Crash tolerance**: after a power loss at any byte-write boundary, the
//!   medium re-mounts and every slot reads as either its previous committed
//!   value or its new one — never a partial mix.
//! - **Wear leveling**: writes land on randomly placed free clusters, so
//!   rewrite traffic spreads across the whole medium without any on-medium
//!   wear metadata.
//! - **Rewrite reserve**: an optional provision holds back capacity so that
//!   payloads up to the reserve can always be replaced, even on a full
//!   medium.
//! - **Optional CRC-8** per cluster, at the cost of one payload byte each.
//!
//! ## Quick start
//!
//! ```
//! use rand::{rngs::StdRng, SeedableRng};
//! use slotstore::{Config, RamNvm, SlotStore};
//!
//! # fn main() -> slotstore::Result<()> {
//! let nvm = RamNvm::new(1024); // stand-in for a real EEPROM driver
//! let rng = StdRng::seed_from_u64(0xC0FFEE);
//! let mut store = SlotStore::new(nvm, rng, Config::default())?;
//! store.open()?;
//!
//! store.write_slot(1, b"boot count: 7")?;
//! let mut buf = [0u8; 64];
//! let len = store.read_slot(1, &mut buf)?;
//! assert_eq!(&buf[..len], b"boot count: 7");
//! # Ok(())
//! # }
//! ```
//!
//! ## Medium layout
//!
//! The medium is divided into fixed-size clusters; a slot's payload lives in
//! a singly-linked chain of them. Each cluster commits with a final marker
//! byte written last, and chains are written back to front, so the start
//! cluster's marker atomically publishes a whole new generation while the
//! old one is still intact. See [`cluster`] for the byte layout and
//! [`engine`] for the crash contract.
//!
//! Bring your own medium by implementing [`Nvm`]; [`RamNvm`] (tests,
//! simulation) and [`FileNvm`] (host files) are included.

pub mod alloc;
pub mod bitmap;
pub mod cluster;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod nvm;

pub use cluster::{crc8_ccitt, Crc8};
pub use engine::{SlotStore, StoreStats};
pub use error::{Error, Result};
pub use geometry::{Config, Geometry};
pub use nvm::{FileNvm, Nvm, RamNvm};
