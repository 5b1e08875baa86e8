//! Free-cluster placement.
//!
//! Allocation starts at a random cluster and probes linearly with wrap-around
//! for the next free one. The random start spreads writes across the whole
//! cluster array, so wear evens out without keeping write-count metadata on
//! the medium; the linear probe keeps allocation cheap and deterministic from
//! the cursor onward.

use crate::bitmap::Bitmap;

/// Find the next free cluster strictly after `cursor`, wrapping around.
///
/// A cursor beyond the cluster array is treated as pointing just before
/// cluster 0. Returns `None` once the probe comes back around to the cursor;
/// the cursor position itself is never a candidate.
pub fn next_free_cluster(used: &Bitmap, cluster_count: usize, cursor: usize) -> Option<usize> {
    let start = cursor.min(cluster_count);
    let mut probe = start + 1;
    // bounded by one full sweep, however the cursor was placed
    for _ in 0..=cluster_count {
        if probe >= cluster_count {
            probe = 0;
        }
        if probe == start {
            return None;
        }
        if !used.is_set(probe) {
            return Some(probe);
        }
        probe += 1;
    }
    None
}
