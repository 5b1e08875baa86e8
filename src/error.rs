use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("store is not open")]
    NotOpen,

    #[error("store is already open")]
    AlreadyOpen,

    #[error("slot {0} is outside the usable slot range")]
    BadSlot(u8),

    #[error("payload length {0} is outside 1..=256")]
    BadLength(usize),

    #[error("no data stored under this slot")]
    NotFound,

    #[error("buffer too small, {needed} bytes needed")]
    BufferTooSmall { needed: usize },

    #[error("not enough free space on the medium")]
    OutOfSpace,

    #[error("medium read failed at address {addr}")]
    Read { addr: usize },

    #[error("medium write failed at address {addr}")]
    Write { addr: usize },

    #[error("medium structure is corrupt")]
    Corrupt,

    #[error("invalid cluster size {0}, supported range is 7..=256")]
    InvalidClusterSize(usize),

    #[error("medium of {size} bytes yields {clusters} clusters, supported range is 1..=256")]
    InvalidClusterCount { size: usize, clusters: usize },

    #[error("invalid last slot {0}, supported range is 1..=250")]
    InvalidSlotRange(u8),

    #[error("provision of {provision} bytes exceeds half of the {capacity} byte capacity")]
    InvalidProvision { provision: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
