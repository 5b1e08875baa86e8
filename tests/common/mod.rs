//! Shared fixtures for integration tests.
//!
//! The "tiny" medium is 64 bytes split into eight 8-byte clusters without
//! CRC, so each cluster carries 3 payload bytes. Small enough to reason
//! about every byte, large enough for multi-cluster chains.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use slotstore::cluster::{ClusterHeader, END_MARKER_PLAIN};
use slotstore::{Config, RamNvm, SlotStore};

pub const CLUSTER_SIZE: usize = 8;
pub const CLUSTER_COUNT: usize = 8;
pub const USER: usize = 3;

pub type TestStore = SlotStore<RamNvm, StdRng>;

pub fn tiny_config() -> Config {
    Config {
        cluster_size: CLUSTER_SIZE,
        ..Config::default()
    }
}

pub fn tiny_medium() -> RamNvm {
    RamNvm::new(CLUSTER_SIZE * CLUSTER_COUNT)
}

/// Stamp a committed cluster image into the raw medium.
pub fn preload(nvm: &mut RamNvm, cluster: usize, header: ClusterHeader, payload: &[u8]) {
    assert!(payload.len() <= CLUSTER_SIZE - 5);
    let base = cluster * CLUSTER_SIZE;
    let bytes = nvm.as_bytes_mut();
    bytes[base..base + 4].copy_from_slice(&header.encode());
    bytes[base + 4..base + 4 + payload.len()].copy_from_slice(payload);
    bytes[base + CLUSTER_SIZE - 1] = END_MARKER_PLAIN;
}

/// Header for a chain that fits one cluster.
pub fn single(slot: u8, age: u8, cluster: usize, payload_len: usize) -> ClusterHeader {
    ClusterHeader {
        slot,
        age,
        start: true,
        end: true,
        next: cluster as u8,
        len: (payload_len - 1) as u8,
    }
}

pub fn mount(nvm: RamNvm) -> TestStore {
    mount_seeded(nvm, 42)
}

pub fn mount_seeded(nvm: RamNvm, seed: u64) -> TestStore {
    let mut store = SlotStore::new(nvm, StdRng::seed_from_u64(seed), tiny_config()).unwrap();
    store.open().unwrap();
    store
}

/// Slot byte of a cluster as it sits on the medium.
pub fn slot_byte(store: &TestStore, cluster: usize) -> u8 {
    store.nvm().as_bytes()[cluster * CLUSTER_SIZE]
}

/// Every available slot must be readable in full with a sane length.
pub fn assert_all_readable(store: &TestStore) {
    for slot in 1..=u8::MAX {
        if store.is_slot_available(slot) {
            let mut buf = [0u8; 256];
            let len = store
                .read_slot(slot, &mut buf)
                .unwrap_or_else(|e| panic!("available slot {slot} unreadable: {e}"));
            assert!((1..=256).contains(&len));
        }
    }
}
