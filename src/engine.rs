//! The slot store engine.
//!
//! [`SlotStore`] keeps up to 250 independently addressable slots of 1..=256
//! payload bytes each on a small byte-addressable medium, and guarantees that
//! a power loss at any byte-write boundary leaves every slot readable as
//! either its previous committed value or its new one.
//!
//! The crash contract rests on two write-ordering rules:
//!
//! - within a cluster, the end-of-cluster marker is written last, so a
//!   cluster is committed by a single byte write;
//! - within a chain, clusters are written back to front, so the start
//!   cluster's marker commits the whole chain at once while the previous
//!   generation is still intact.
//!
//! Mounting scans the medium, resolves competing generations per slot and
//! zeroes everything that is not part of a winning chain, which is how torn
//! writes are garbage-collected after a crash.

use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alloc::next_free_cluster;
use crate::bitmap::{Bitmap, SlotBitmap};
use crate::cluster::{self, ClusterHeader, DATA_OFFSET, HEADER_LEN};
use crate::error::{Error, Result};
use crate::geometry::{Config, Geometry};
use crate::nvm::Nvm;

/// Generation to try first for each set of present start-cluster ages.
///
/// Ages live on a mod-4 cycle and at most two generations of one slot may
/// coexist (the committed one and an in-flight rewrite). The table maps the
/// 4-bit mask of present ages to the newest generation of the contiguous
/// run. Entries with the high nibble set describe sets that no single crash
/// can produce (a gap in the run, or more than two live generations); the
/// named generation is then rejected without walking its chain.
const GENERATION_PICK: [u8; 16] = [
    0xF0, // ----
    0x00, // 0---
    0x01, // -1--
    0x01, // 01--  0 is the stale one
    0x02, // --2-
    0xF2, // 0-2-  gap in the run
    0x02, // -12-  1 is the stale one
    0xF2, // 012-  three live generations
    0x03, // ---3
    0x00, // 0--3  3 is the stale one
    0xF3, // -1-3  gap in the run
    0xF1, // 01-3  three live generations
    0x03, // --23  2 is the stale one
    0xF0, // 0-23  three live generations
    0xF3, // -123  three live generations
    0xF3, // 0123  four live generations
];

const GENERATION_ANOMALY: u8 = 0xF0;
const GENERATION_AGE: u8 = 0x03;

/// Crash-tolerant, wear-aware slot store over an [`Nvm`] medium.
///
/// The store owns the medium and a host-seeded PRNG for wear leveling. It is
/// single-threaded and not re-entrant; a host with multiple writers must
/// serialize externally.
///
/// # Examples
///
/// ```
/// use rand::{rngs::StdRng, SeedableRng};
/// use slotstore::{Config, RamNvm, SlotStore};
///
/// # fn main() -> slotstore::Result<()> {
/// let nvm = RamNvm::new(1024);
/// let rng = StdRng::seed_from_u64(7);
/// let mut store = SlotStore::new(nvm, rng, Config::default())?;
/// store.open()?;
///
/// store.write_slot(1, b"calibration")?;
/// let mut buf = [0u8; 32];
/// let len = store.read_slot(1, &mut buf)?;
/// assert_eq!(&buf[..len], b"calibration");
/// # Ok(())
/// # }
/// ```
pub struct SlotStore<N: Nvm, R: RngCore> {
    nvm: N,
    rng: R,
    geometry: Geometry,
    opened: bool,
    used: Bitmap,
    available: SlotBitmap,
}

/// Point-in-time occupancy snapshot, serializable for host diagnostics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub cluster_count: usize,
    pub used_clusters: usize,
    pub free_clusters: usize,
    pub available_slots: usize,
    pub free_bytes: usize,
}

impl<N: Nvm, R: RngCore> SlotStore<N, R> {
    /// Wrap a medium. Validates the geometry but does not touch the medium;
    /// call [`open`](Self::open) before any slot operation.
    pub fn new(nvm: N, rng: R, config: Config) -> Result<Self> {
        let geometry = Geometry::new(nvm.size(), &config)?;
        Ok(SlotStore {
            nvm,
            rng,
            used: Bitmap::new(geometry.cluster_count()),
            available: SlotBitmap::new(&geometry),
            geometry,
            opened: false,
        })
    }

    /// Mount the medium: validate every cluster, resolve competing
    /// generations per slot and invalidate everything that is not part of a
    /// winning chain.
    ///
    /// Opening an already-open store fails with [`Error::AlreadyOpen`]; a
    /// host that wants a fresh mount builds a new store around the medium
    /// ([`into_nvm`](Self::into_nvm) + [`new`](Self::new)).
    pub fn open(&mut self) -> Result<()> {
        if self.opened {
            return Err(Error::AlreadyOpen);
        }

        let count = self.geometry.cluster_count();
        // a failed earlier attempt must not leak bits into this scan
        self.used = Bitmap::new(count);
        self.available = SlotBitmap::new(&self.geometry);

        let mut headers: Vec<Option<ClusterHeader>> = vec![None; count];
        let mut image = vec![0u8; self.geometry.cluster_size()];
        for cluster in 0..count {
            self.nvm.read(self.geometry.cluster_addr(cluster), &mut image)?;
            if let Some(header) = cluster::decode(&image, &self.geometry) {
                self.used.set(cluster);
                self.available.set(header.slot);
                headers[cluster] = Some(header);
            }
        }

        for slot in self.geometry.first_slot()..=self.geometry.last_slot() {
            if self.available.is_set(slot) {
                self.resolve_slot(slot, &headers);
            }
        }

        self.opened = true;
        info!(
            clusters = self.used.ones(),
            slots = self.available.ones(),
            "store mounted"
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Whether the slot currently holds a committed chain. Any byte value
    /// may be probed; out-of-range slots read as unavailable.
    pub fn is_slot_available(&self, slot: u8) -> bool {
        self.available.is_set(slot)
    }

    /// Store `payload` under `slot`, atomically replacing any previous value.
    ///
    /// The new chain is fully committed before the old one is torn down; a
    /// power loss anywhere in between leaves one of the two values readable
    /// after the next mount. A write failure reported by the driver is
    /// treated as power loss: the call fails and the host is expected to
    /// re-mount the medium.
    pub fn write_slot(&mut self, slot: u8, payload: &[u8]) -> Result<()> {
        if !self.opened {
            return Err(Error::NotOpen);
        }
        if payload.is_empty() || payload.len() > 256 {
            return Err(Error::BadLength(payload.len()));
        }
        if !self.geometry.contains_slot(slot) {
            return Err(Error::BadSlot(slot));
        }

        let previous = self.find_start(slot)?;
        let new_age = previous.map_or(0, |(_, header)| (header.age + 1) & 0x03);

        // overwriting releases the old chain, but only up to the reserve:
        // the new chain must fit while the old one still occupies its space
        let release_credit = previous.map_or(0, |(_, header)| {
            let clusters = self.geometry.clusters_for(header.len as usize + 1);
            (clusters * self.geometry.user_per_cluster()).min(self.geometry.provision())
        });
        if self.free() + release_credit < payload.len() {
            return Err(Error::OutOfSpace);
        }

        let count = self.geometry.cluster_count();
        let needed = self.geometry.clusters_for(payload.len());
        let mut chain = Vec::with_capacity(needed);
        let mut cursor = self.rng.next_u32() as usize % count;
        for _ in 0..needed {
            cursor = next_free_cluster(&self.used, count, cursor).ok_or(Error::OutOfSpace)?;
            chain.push(cursor);
        }

        let user = self.geometry.user_per_cluster();
        let size = self.geometry.cluster_size();
        for index in (0..needed).rev() {
            let cluster = chain[index];
            let addr = self.geometry.cluster_addr(cluster);
            let marker_addr = addr + size - 1;

            // a free cluster may still carry a commit marker from a past life
            if self.nvm.read_byte(marker_addr)? == self.geometry.end_marker() {
                self.nvm.write_byte(marker_addr, 0x00)?;
            }

            let offset = index * user;
            let take = (payload.len() - offset).min(user);
            let last = index == needed - 1;
            let header = ClusterHeader {
                slot,
                age: new_age,
                start: index == 0,
                end: last,
                next: if last { cluster as u8 } else { chain[index + 1] as u8 },
                len: if index == 0 {
                    (payload.len() - 1) as u8
                } else {
                    take as u8
                },
            };
            let head = header.encode();
            self.nvm.write(addr, &head)?;
            self.nvm.write(addr + DATA_OFFSET, &payload[offset..offset + take])?;
            if let Some(crc_fn) = self.geometry.crc() {
                let mut crc = cluster::crc8_over(crc_fn, 0, &head);
                crc = cluster::crc8_over(crc_fn, crc, &payload[offset..offset + take]);
                self.nvm.write_byte(addr + size - 2, crc)?;
            }
            // commit point: this byte makes the cluster visible to a mount
            self.nvm.write_byte(marker_addr, self.geometry.end_marker())?;
            self.used.set(cluster);
        }

        match previous {
            Some((old_start, _)) => {
                if let Err(error) = self.clear_chain(old_start) {
                    // the new chain is committed; the next mount finishes this
                    warn!(slot, %error, "stale chain teardown incomplete");
                }
            }
            None => self.available.set(slot),
        }
        debug!(slot, len = payload.len(), clusters = needed, "slot written");
        Ok(())
    }

    /// Read the slot's payload into `buf`, returning its length.
    ///
    /// A too-small buffer fails with [`Error::BufferTooSmall`] carrying the
    /// required length, so `read_slot(slot, &mut [])` doubles as a size
    /// probe; [`slot_len`](Self::slot_len) wraps that.
    pub fn read_slot(&self, slot: u8, buf: &mut [u8]) -> Result<usize> {
        if !self.opened {
            return Err(Error::NotOpen);
        }
        let (start, header) = self.find_start(slot)?.ok_or(Error::NotFound)?;
        let needed = header.len as usize + 1;
        if needed > buf.len() {
            return Err(Error::BufferTooSmall { needed });
        }

        let user = self.geometry.user_per_cluster();
        let mut cluster = start;
        let mut current = header;
        let mut copied = 0;
        loop {
            let take = (needed - copied).min(user);
            let addr = self.geometry.cluster_addr(cluster) + DATA_OFFSET;
            self.nvm.read(addr, &mut buf[copied..copied + take])?;
            copied += take;
            if current.end || copied == needed {
                break;
            }
            let next = current.next as usize;
            if next >= self.geometry.cluster_count() {
                return Err(Error::Corrupt);
            }
            cluster = next;
            current = self.read_header(next)?;
        }
        Ok(needed)
    }

    /// Length of the payload stored under `slot`.
    pub fn slot_len(&self, slot: u8) -> Result<usize> {
        if !self.opened {
            return Err(Error::NotOpen);
        }
        let (_, header) = self.find_start(slot)?.ok_or(Error::NotFound)?;
        Ok(header.len as usize + 1)
    }

    /// Remove the slot's chain from the medium.
    pub fn erase_slot(&mut self, slot: u8) -> Result<()> {
        if !self.opened {
            return Err(Error::NotOpen);
        }
        let (start, _) = self.find_start(slot)?.ok_or(Error::NotFound)?;
        self.clear_chain(start)?;
        self.available.clear(slot);
        debug!(slot, "slot erased");
        Ok(())
    }

    /// Total payload capacity in bytes, including the rewrite reserve.
    pub fn size(&self) -> usize {
        self.geometry.size()
    }

    /// Capacity net of the rewrite reserve.
    pub fn usable_size(&self) -> usize {
        self.geometry.usable_size()
    }

    /// Bytes still writable, net of the rewrite reserve.
    pub fn free(&self) -> usize {
        let used_bytes = self.used.ones() * self.geometry.user_per_cluster();
        let free = self.geometry.size().saturating_sub(used_bytes);
        if free < self.geometry.provision() {
            0
        } else {
            free - self.geometry.provision()
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn stats(&self) -> StoreStats {
        let used_clusters = self.used.ones();
        StoreStats {
            cluster_count: self.geometry.cluster_count(),
            used_clusters,
            free_clusters: self.geometry.cluster_count() - used_clusters,
            available_slots: self.available.ones(),
            free_bytes: self.free(),
        }
    }

    /// Borrow the medium, e.g. to inspect wear counters in tests.
    pub fn nvm(&self) -> &N {
        &self.nvm
    }

    /// Hand the medium back, consuming the store. This is how a host
    /// re-mounts after a write failure: build a new store around the
    /// returned medium and `open` it.
    pub fn into_nvm(self) -> N {
        self.nvm
    }

    /// Resolve which generation of `slot` survives and invalidate the rest.
    fn resolve_slot(&mut self, slot: u8, headers: &[Option<ClusterHeader>]) {
        let count = self.geometry.cluster_count();
        let mut members = Bitmap::new(count);
        let mut first_by_age: [Option<usize>; 4] = [None; 4];
        let mut age_mask = 0u8;

        for cluster in 0..count {
            let Some(header) = headers[cluster] else { continue };
            if header.slot != slot || !self.used.is_set(cluster) {
                continue;
            }
            members.set(cluster);
            if header.start {
                first_by_age[header.age as usize] = Some(cluster);
                age_mask |= 1 << header.age;
            }
        }

        let mut winner: Option<Bitmap> = None;
        while age_mask != 0 {
            let entry = GENERATION_PICK[age_mask as usize];
            let age = entry & GENERATION_AGE;
            if entry & GENERATION_ANOMALY != 0 {
                warn!(slot, mask = age_mask, age, "impossible generation set, rejecting");
                age_mask &= !(1 << age);
                continue;
            }
            let Some(start) = first_by_age[age as usize] else {
                age_mask &= !(1 << age);
                continue;
            };
            match self.walk_chain(age, start, &members, headers) {
                Some(valid) => {
                    winner = Some(valid);
                    break;
                }
                None => {
                    debug!(slot, age, "discarding torn generation");
                    age_mask &= !(1 << age);
                }
            }
        }

        match winner {
            Some(valid) => {
                for cluster in 0..count {
                    if members.is_set(cluster) && !valid.is_set(cluster) {
                        self.clear_cluster(cluster).ok();
                    }
                }
            }
            None => {
                for cluster in 0..count {
                    if members.is_set(cluster) {
                        self.clear_cluster(cluster).ok();
                    }
                }
                self.available.clear(slot);
            }
        }
    }

    /// Walk one generation's chain; `Some` holds the set of its clusters if
    /// the chain is complete and consistent.
    fn walk_chain(
        &self,
        age: u8,
        start: usize,
        members: &Bitmap,
        headers: &[Option<ClusterHeader>],
    ) -> Option<Bitmap> {
        let user = self.geometry.user_per_cluster();
        let mut valid = Bitmap::new(self.geometry.cluster_count());
        valid.set(start);

        let start_header = headers[start]?;
        let len_field = start_header.len as usize;
        // a complete chain can carry at most one cluster of slack; anything
        // longer is a ring or a stitched-together fragment
        let limit = len_field + 1 + user;
        let mut max_payload = user;

        let mut current = start_header;
        while !current.end {
            let next = current.next as usize;
            valid.set(next);
            if !members.is_set(next) {
                return None;
            }
            let next_header = headers[next]?;
            if next_header.age != age || next_header.start {
                return None;
            }
            max_payload += user;
            if max_payload >= limit {
                return None;
            }
            current = next_header;
        }

        if max_payload < len_field + 1 {
            // the chain ended before covering the declared length
            return None;
        }
        Some(valid)
    }

    /// Find the start cluster currently holding `slot`.
    fn find_start(&self, slot: u8) -> Result<Option<(usize, ClusterHeader)>> {
        for cluster in 0..self.geometry.cluster_count() {
            if !self.used.is_set(cluster) {
                continue;
            }
            let header = self.read_header(cluster)?;
            if header.slot == slot && header.start {
                return Ok(Some((cluster, header)));
            }
        }
        Ok(None)
    }

    fn read_header(&self, cluster: usize) -> Result<ClusterHeader> {
        let mut bytes = [0u8; HEADER_LEN];
        self.nvm.read(self.geometry.cluster_addr(cluster), &mut bytes)?;
        Ok(ClusterHeader::parse(&bytes))
    }

    /// Invalidate one cluster. Zeroing the slot byte is enough: the mount
    /// scan rejects any cluster whose slot byte is out of range.
    fn clear_cluster(&mut self, cluster: usize) -> Result<()> {
        self.nvm
            .write_byte(self.geometry.cluster_addr(cluster), 0x00)?;
        self.used.clear(cluster);
        Ok(())
    }

    /// Tear down a chain starting at `first`.
    ///
    /// Only a failure on the first cluster propagates; once the start
    /// cluster is invalid the chain is invisible to mounts, so failures
    /// further down are logged and left for the next mount to harvest.
    fn clear_chain(&mut self, first: usize) -> Result<()> {
        self.clear_cluster(first)?;

        let mut addr = self.geometry.cluster_addr(first);
        let mut depth = self.geometry.max_chain_clusters();
        loop {
            let flags = match self.nvm.read_byte(addr + 1) {
                Ok(flags) => flags,
                Err(_) => break,
            };
            if flags & cluster::FLAG_END != 0 {
                break;
            }
            let next = match self.nvm.read_byte(addr + 2) {
                Ok(next) => next as usize,
                Err(_) => break,
            };
            if next >= self.geometry.cluster_count() {
                break;
            }
            addr = self.geometry.cluster_addr(next);
            if self.nvm.write_byte(addr, 0x00).is_err() {
                warn!(cluster = next, "chain teardown stopped by write failure");
                break;
            }
            self.used.clear(next);
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
        Ok(())
    }
}
