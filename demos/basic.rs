//! Basic slot store usage.
//!
//! Walks through mounting a medium, writing, reading, overwriting and
//! erasing slots, and watching the space accounting move.
//!
//! Run with: cargo run --example basic

use rand::rngs::StdRng;
use rand::SeedableRng;
use slotstore::{Config, RamNvm, SlotStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().compact().init();

    // a 1 KiB RAM medium stands in for a real EEPROM driver
    let nvm = RamNvm::new(1024);
    let rng = StdRng::seed_from_u64(0x5107);
    let mut store = SlotStore::new(nvm, rng, Config::default())?;
    store.open()?;

    println!("mounted: {} bytes usable, {} free", store.usable_size(), store.free());

    // slots hold raw bytes; the host picks the numbering scheme
    store.write_slot(1, b"node-id=7f3a")?;
    store.write_slot(2, &[0x13, 0x37, 0x00, 0x42])?;
    println!("after two writes: {} bytes free", store.free());

    let mut buf = [0u8; 64];
    let len = store.read_slot(1, &mut buf)?;
    println!("slot 1 holds {:?}", String::from_utf8_lossy(&buf[..len]));

    // overwrites are atomic: power loss yields the old or the new value
    store.write_slot(1, b"node-id=9c1b")?;
    let len = store.read_slot(1, &mut buf)?;
    println!("slot 1 now holds {:?}", String::from_utf8_lossy(&buf[..len]));

    store.erase_slot(2)?;
    println!("after erase: {} bytes free", store.free());

    let stats = store.stats();
    println!("stats: {}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
