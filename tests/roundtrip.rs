//! Property tests over the public surface.

use std::collections::HashMap;

use proptest::collection::vec;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use slotstore::{Config, Error, RamNvm, SlotStore};

const CLUSTER_SIZE: usize = 32;
const CLUSTER_COUNT: usize = 64;
const USER: usize = 27;

type Store = SlotStore<RamNvm, StdRng>;

fn fresh_store(seed: u64) -> Store {
    let config = Config {
        cluster_size: CLUSTER_SIZE,
        ..Config::default()
    };
    let nvm = RamNvm::new(CLUSTER_SIZE * CLUSTER_COUNT);
    let mut store = SlotStore::new(nvm, StdRng::seed_from_u64(seed), config).unwrap();
    store.open().unwrap();
    store
}

proptest! {
    #[test]
    fn any_payload_round_trips(
        slot in 1u8..=64,
        payload in vec(any::<u8>(), 1..=256),
        seed in any::<u64>(),
    ) {
        let mut store = fresh_store(seed);
        store.write_slot(slot, &payload).unwrap();

        prop_assert!(store.is_slot_available(slot));
        prop_assert_eq!(store.slot_len(slot).unwrap(), payload.len());

        let mut buf = [0u8; 256];
        let len = store.read_slot(slot, &mut buf).unwrap();
        prop_assert_eq!(&buf[..len], &payload[..]);
    }

    #[test]
    fn last_write_per_slot_wins(
        writes in vec((1u8..=16, vec(any::<u8>(), 1..=40)), 1..24),
        seed in any::<u64>(),
    ) {
        let mut store = fresh_store(seed);
        let mut expected: HashMap<u8, Vec<u8>> = HashMap::new();

        for (slot, payload) in &writes {
            store.write_slot(*slot, payload).unwrap();
            expected.insert(*slot, payload.clone());
        }

        for (slot, payload) in &expected {
            let mut buf = [0u8; 256];
            let len = store.read_slot(*slot, &mut buf).unwrap();
            prop_assert_eq!(&buf[..len], &payload[..], "slot {}", slot);
        }
    }

    #[test]
    fn free_space_matches_occupancy(
        writes in vec((1u8..=16, 1usize..=80), 1..16),
        seed in any::<u64>(),
    ) {
        let mut store = fresh_store(seed);
        let mut lens: HashMap<u8, usize> = HashMap::new();

        for (slot, len) in writes {
            store.write_slot(slot, &vec![0xA5; len]).unwrap();
            lens.insert(slot, len);
        }

        let occupied: usize = lens.values().map(|len| len.div_ceil(USER) * USER).sum();
        prop_assert_eq!(store.free(), store.usable_size() - occupied);
    }

    #[test]
    fn erased_slots_stay_gone_across_remount(
        slots in vec(1u8..=16, 1..8),
        seed in any::<u64>(),
    ) {
        let mut store = fresh_store(seed);
        for slot in &slots {
            store.write_slot(*slot, &[*slot; 5]).unwrap();
        }
        let victim = slots[0];
        store.erase_slot(victim).unwrap();

        prop_assert!(!store.is_slot_available(victim));
        prop_assert!(matches!(store.erase_slot(victim), Err(Error::NotFound)));

        let config = Config { cluster_size: CLUSTER_SIZE, ..Config::default() };
        let mut store =
            SlotStore::new(store.into_nvm(), StdRng::seed_from_u64(seed ^ 1), config).unwrap();
        store.open().unwrap();
        prop_assert!(!store.is_slot_available(victim));
        for slot in &slots {
            if *slot != victim {
                let mut buf = [0u8; 8];
                prop_assert_eq!(store.read_slot(*slot, &mut buf).unwrap(), 5);
                prop_assert_eq!(&buf[..5], &[*slot; 5]);
            }
        }
    }

    #[test]
    fn buffer_too_small_reports_exact_length(
        payload in vec(any::<u8>(), 2..=256),
        seed in any::<u64>(),
    ) {
        let mut store = fresh_store(seed);
        store.write_slot(1, &payload).unwrap();

        let mut short = vec![0u8; payload.len() - 1];
        match store.read_slot(1, &mut short) {
            Err(Error::BufferTooSmall { needed }) => prop_assert_eq!(needed, payload.len()),
            other => prop_assert!(false, "expected BufferTooSmall, got {other:?}"),
        }
    }
}
