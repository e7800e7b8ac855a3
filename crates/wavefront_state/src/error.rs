//! Errors surfaced while building state arenas on the host.
//!
//! The per-path hot loop is error-free by contract; everything that can go
//! wrong goes wrong once, at construction time, when the dispatcher sizes the
//! arena.

use std::error::Error;
use std::fmt;

/// Errors from sizing and building the SoA state arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StateError {
    /// A slot count of zero was requested.
    ZeroCapacity,
    /// The requested slot count does not fit the 31-bit index space that
    /// path handles use (the sign bit is the null sentinel).
    CapacityOverflow { requested: usize },
    /// The sort-partition configuration does not divide the main slot range.
    InvalidPartition { num_slots: usize, partitions: usize },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StateError::ZeroCapacity => write!(f, "state arena must have at least one slot"),
            StateError::CapacityOverflow { requested } => write!(
                f,
                "{requested} slots do not fit the 31-bit path index space"
            ),
            StateError::InvalidPartition { num_slots, partitions } => write!(
                f,
                "{partitions} sort partitions do not evenly divide {num_slots} slots"
            ),
        }
    }
}

impl Error for StateError {}

pub type StateResult<T> = Result<T, StateError>;
