//! Auto-bootstrap network formation.
//!
//! This crate owns the lifecycle that turns an isolated node into a
//! network participant:
//!
//! ```text
//! Pioneer ──→ Discovery ──→ Genesis ──→ Network
//!    ↑            │             │
//!    └────────────┴── reset() ──┘
//! ```
//!
//! The [`machine::BootstrapMachine`] is the single writer of bootstrap
//! state: discovery workers and the negotiation driver hand it results,
//! they never mutate state themselves. Feature gating rides on the same
//! machine — transaction sending, mining, consensus participation, and
//! block validation stay restricted until the node reaches `Network`.

pub mod config;
pub mod error;
pub mod event;
pub mod guided;
pub mod machine;
pub mod negotiate;
pub mod node;
pub mod service;

pub use config::NodeConfig;
pub use error::{BootstrapError, Result};
pub use event::{Event, EventBus};
pub use guided::{GuidedBootstrap, GuidedConfig};
pub use machine::{BootstrapMachine, BootstrapState, Mode, RESTRICTED_FEATURES};
pub use node::EmberNode;
pub use service::PeerService;
