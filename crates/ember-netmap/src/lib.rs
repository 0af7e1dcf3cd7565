//! Network map retrieval and validation.
//!
//! The coordinator is best-effort and untrusted-by-default: every map it
//! hands out is validated for structure and freshness before anything
//! acts on it. When the coordinator is unreachable or the map fails
//! validation, the node falls back to its last persisted snapshot, and
//! failing that to a clearly-marked degraded map — it never halts, and it
//! never silently treats stale data as current.

mod coordinator;
mod error;
mod map;
mod store;
mod validator;

pub use coordinator::{HttpCoordinator, NodeRegistration};
pub use error::{Error, MapRejection, Result};
pub use map::{
    MapNode, NetworkHealth, NetworkMap, NetworkPhase, Provenance, COORDINATOR_FRESHNESS,
    FALLBACK_FRESHNESS, PIONEER_NODE_THRESHOLD,
};
pub use store::{write_atomic, MapStore};
pub use validator::{validate_map, MapValidator, MAX_FUTURE_SKEW};
