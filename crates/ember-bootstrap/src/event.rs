//! Observable bootstrap events.
//!
//! Components publish typed events onto a broadcast bus; the CLI or any
//! feedback layer subscribes instead of polling. Slow subscribers lag and
//! drop, they never block the publisher.

use crate::machine::Mode;
use ember_genesis::Phase;
use ember_peer::PeerCandidate;
use tokio::sync::broadcast;
use tracing::trace;

/// Default bus capacity before slow subscribers start lagging.
const EVENT_CAPACITY: usize = 64;

/// Everything the bootstrap subsystem announces to the outside.
#[derive(Debug, Clone)]
pub enum Event {
    ModeChanged { from: Mode, to: Mode },
    PeerDiscovered(PeerCandidate),
    GenesisPhaseChanged { from: Phase, to: Phase },
    GenesisCompleted { network_id: String, genesis_hash: String },
    GenesisFailed { reason: &'static str, detail: String },
    BootstrapError { reason: &'static str, detail: String },
}

/// Broadcast bus for [`Event`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. A bus with no subscribers is fine.
    pub fn emit(&self, event: Event) {
        trace!(?event, "bootstrap event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
