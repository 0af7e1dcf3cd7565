//! Error types for ember-netmap.

use std::time::Duration;
use thiserror::Error;

/// Result type for ember-netmap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a candidate map was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapRejection {
    /// A live network reports at least one active node.
    #[error("map reports {active} active nodes")]
    NoActiveNodes { active: u32 },

    /// Older than its provenance-specific freshness bound.
    #[error("map is {age:?} old, bound is {bound:?}")]
    Stale { age: Duration, bound: Duration },

    /// Timestamped ahead of the local clock beyond allowed skew.
    #[error("map timestamp is {ahead:?} ahead of local clock")]
    FromTheFuture { ahead: Duration },

    /// A candidate entry is structurally unusable.
    #[error("candidate {index} is malformed: {reason}")]
    MalformedCandidate { index: usize, reason: &'static str },
}

/// Errors that can occur retrieving or persisting maps.
#[derive(Debug, Error)]
pub enum Error {
    /// Coordinator unreachable, non-2xx, or body malformed — all treated
    /// identically.
    #[error("coordinator unavailable: {0}")]
    Unavailable(String),

    /// Snapshot file I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file did not parse.
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}
