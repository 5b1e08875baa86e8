#![no_main]

//! Mount arbitrary medium images. Whatever the bytes say, mounting must not
//! panic, and every slot the mount reports available must read back in full.

use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;
use slotstore::{Config, RamNvm, SlotStore};

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let image = data[..data.len().min(2048)].to_vec();
    let nvm = RamNvm::from_image(image);

    let config = Config {
        cluster_size: 8,
        ..Config::default()
    };
    let Ok(mut store) = SlotStore::new(nvm, StdRng::seed_from_u64(0), config) else {
        return;
    };
    if store.open().is_err() {
        return;
    }

    assert!(store.free() <= store.usable_size());
    for slot in 1..=u8::MAX {
        if store.is_slot_available(slot) {
            let mut buf = [0u8; 256];
            let len = store
                .read_slot(slot, &mut buf)
                .expect("available slot must be readable");
            assert!((1..=256).contains(&len));
        }
    }
});
