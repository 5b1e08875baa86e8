#![no_main]

//! Byte-driven operation sequences over a small medium: writes, erases,
//! reads and remounts in whatever order the fuzzer invents. Round-trips
//! must hold and the space accounting must never drift.

use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;
use slotstore::{Config, Error, RamNvm, SlotStore};

fuzz_target!(|data: &[u8]| {
    let config = Config {
        cluster_size: 16,
        ..Config::default()
    };
    let mut store =
        SlotStore::new(RamNvm::new(256), StdRng::seed_from_u64(1), config).unwrap();
    store.open().unwrap();

    let mut bytes = data.iter().copied();
    while let Some(op) = bytes.next() {
        match op % 4 {
            0 => {
                let slot = bytes.next().unwrap_or(1);
                let len = (bytes.next().unwrap_or(1) as usize % 32) + 1;
                let payload: Vec<u8> = (&mut bytes).take(len).collect();
                if payload.is_empty() {
                    break;
                }
                match store.write_slot(slot, &payload) {
                    Ok(()) => {
                        let mut buf = [0u8; 256];
                        let read = store.read_slot(slot, &mut buf).unwrap();
                        assert_eq!(&buf[..read], &payload[..]);
                    }
                    Err(Error::BadSlot(_) | Error::OutOfSpace) => {}
                    Err(other) => panic!("unexpected write error: {other}"),
                }
            }
            1 => {
                let slot = bytes.next().unwrap_or(1);
                match store.erase_slot(slot) {
                    Ok(()) => assert!(!store.is_slot_available(slot)),
                    Err(Error::NotFound) => {}
                    Err(other) => panic!("unexpected erase error: {other}"),
                }
            }
            2 => {
                let slot = bytes.next().unwrap_or(1);
                let mut buf = [0u8; 256];
                match store.read_slot(slot, &mut buf) {
                    Ok(len) => assert!((1..=256).contains(&len)),
                    Err(Error::NotFound) => {}
                    Err(other) => panic!("unexpected read error: {other}"),
                }
            }
            _ => {
                let nvm = store.into_nvm();
                store = SlotStore::new(nvm, StdRng::seed_from_u64(2), config).unwrap();
                store.open().unwrap();
            }
        }
        assert!(store.free() <= store.usable_size());
    }
});
