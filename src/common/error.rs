use thiserror::Error;

/// Storage engine error types.
///
/// Expected conditions (a full pool, a missing page, a pinned page) are
/// encoded in return values, not errors. The only faults that surface
/// here are disk I/O failures and hash-directory exhaustion.
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hash directory exhausted: no hash bit distinguishes the colliding keys")]
    CapacityExceeded,
}

pub type Result<T> = std::result::Result<T, QuarryError>;
