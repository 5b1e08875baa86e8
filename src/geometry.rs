//! Medium geometry: everything derived from the cluster size, the medium
//! size and the configured options, validated once at store construction.

use serde::{Deserialize, Serialize};

use crate::cluster::{Crc8, END_MARKER_CRC, END_MARKER_PLAIN, HEADER_LEN};
use crate::error::{Error, Result};

/// Smallest cluster that still fits header, one payload byte, CRC and marker.
const MIN_CLUSTER_SIZE: usize = HEADER_LEN + 3;
/// Cluster indices travel in one byte.
const MAX_CLUSTER_COUNT: usize = 256;
const MAX_CLUSTER_SIZE: usize = 256;
/// Slot numbers above this are reserved byte values.
const MAX_LAST_SLOT: u8 = 250;

/// Store configuration supplied by the host.
///
/// `cluster_size` trades per-cluster overhead against allocation granularity;
/// typical values are 16, 32, 64, 128 or 256. `provision` reserves user bytes
/// so that any payload up to that size can always be rewritten in place.
/// `last_slot` of 0 picks as many slots as there are clusters (capped at 250).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Config {
    pub cluster_size: usize,
    pub provision: usize,
    pub last_slot: u8,
    /// CRC-8 step function; `None` frees one extra payload byte per cluster.
    #[serde(skip)]
    pub crc: Option<Crc8>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster_size: 32,
            provision: 0,
            last_slot: 0,
            crc: None,
        }
    }
}

/// Validated, derived geometry of one medium.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    cluster_size: usize,
    cluster_count: usize,
    user_per_cluster: usize,
    provision: usize,
    last_slot: u8,
    end_marker: u8,
    crc: Option<Crc8>,
}

impl Geometry {
    /// Derive and validate the geometry for a medium of `nvm_size` bytes.
    pub fn new(nvm_size: usize, config: &Config) -> Result<Self> {
        if !(MIN_CLUSTER_SIZE..=MAX_CLUSTER_SIZE).contains(&config.cluster_size) {
            return Err(Error::InvalidClusterSize(config.cluster_size));
        }
        let cluster_count = nvm_size / config.cluster_size;
        if !(1..=MAX_CLUSTER_COUNT).contains(&cluster_count) {
            return Err(Error::InvalidClusterCount {
                size: nvm_size,
                clusters: cluster_count,
            });
        }
        if config.last_slot > MAX_LAST_SLOT {
            return Err(Error::InvalidSlotRange(config.last_slot));
        }
        let last_slot = if config.last_slot == 0 {
            cluster_count.min(MAX_LAST_SLOT as usize) as u8
        } else {
            config.last_slot
        };

        let user_per_cluster =
            config.cluster_size - HEADER_LEN - 2 + usize::from(config.crc.is_none());
        let capacity = cluster_count * user_per_cluster;
        if config.provision * 2 > capacity {
            return Err(Error::InvalidProvision {
                provision: config.provision,
                capacity,
            });
        }
        let provision = config.provision.div_ceil(user_per_cluster) * user_per_cluster;

        Ok(Geometry {
            cluster_size: config.cluster_size,
            cluster_count,
            user_per_cluster,
            provision,
            last_slot,
            end_marker: if config.crc.is_some() {
                END_MARKER_CRC
            } else {
                END_MARKER_PLAIN
            },
            crc: config.crc,
        })
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Payload bytes per cluster.
    pub fn user_per_cluster(&self) -> usize {
        self.user_per_cluster
    }

    /// Rewrite reserve in bytes, rounded up to whole clusters.
    pub fn provision(&self) -> usize {
        self.provision
    }

    pub fn first_slot(&self) -> u8 {
        1
    }

    pub fn last_slot(&self) -> u8 {
        self.last_slot
    }

    pub fn end_marker(&self) -> u8 {
        self.end_marker
    }

    pub(crate) fn crc(&self) -> Option<Crc8> {
        self.crc
    }

    pub fn contains_slot(&self, slot: u8) -> bool {
        (self.first_slot()..=self.last_slot).contains(&slot)
    }

    /// Total payload capacity of the medium in bytes.
    pub fn size(&self) -> usize {
        self.cluster_count * self.user_per_cluster
    }

    /// Capacity net of the rewrite reserve.
    pub fn usable_size(&self) -> usize {
        self.size() - self.provision
    }

    /// Clusters needed to hold `len` payload bytes.
    pub fn clusters_for(&self, len: usize) -> usize {
        len.div_ceil(self.user_per_cluster)
    }

    /// Byte address of the first byte of a cluster.
    pub fn cluster_addr(&self, cluster: usize) -> usize {
        cluster * self.cluster_size
    }

    /// Upper bound on chain length; walks past this are runaway.
    pub(crate) fn max_chain_clusters(&self) -> usize {
        256usize.div_ceil(self.user_per_cluster)
    }
}
