//! Connection-attempt telemetry.
//!
//! Every outbound connection attempt — guided or scanned, success or
//! failure — is recorded here. The log is append-only and bounded: entries
//! are never mutated after creation, and once the ring is full the oldest
//! entry is dropped. Exactly one component owns and writes a given log;
//! readers take snapshot copies.

use crate::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::IpAddr;

/// Maximum retained attempts.
pub const ATTEMPT_LOG_CAPACITY: usize = 100;

/// One outbound connection attempt, recorded after it resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionAttempt {
    /// Candidate the attempt targeted, when known before connecting.
    pub candidate_id: Option<PeerId>,
    pub addr: IpAddr,
    pub port: u16,
    pub success: bool,
    /// Failure description, `None` on success.
    pub error: Option<String>,
    /// Time from connect start to handshake completion (or failure).
    pub latency_ms: u64,
    /// When the attempt resolved (unix millis).
    pub timestamp: u64,
}

/// Aggregate view over the retained attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttemptStats {
    pub total: usize,
    pub successes: usize,
    /// Fraction of retained attempts that succeeded, 0.0 when empty.
    pub success_rate: f64,
    /// Mean latency over successful attempts, 0.0 when none succeeded.
    pub mean_latency_ms: f64,
}

/// Bounded append-only ring of connection attempts.
#[derive(Debug, Default)]
pub struct AttemptLog {
    entries: VecDeque<ConnectionAttempt>,
}

impl AttemptLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(ATTEMPT_LOG_CAPACITY),
        }
    }

    /// Append an attempt, evicting the oldest entry once at capacity.
    pub fn record(&mut self, attempt: ConnectionAttempt) {
        if self.entries.len() == ATTEMPT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(attempt);
    }

    /// Snapshot copy of the retained attempts, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConnectionAttempt> {
        self.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Success rate and mean latency over the retained window.
    #[must_use]
    pub fn stats(&self) -> AttemptStats {
        let total = self.entries.len();
        let successes = self.entries.iter().filter(|a| a.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64
        };
        let mean_latency_ms = if successes == 0 {
            0.0
        } else {
            let sum: u64 = self
                .entries
                .iter()
                .filter(|a| a.success)
                .map(|a| a.latency_ms)
                .sum();
            sum as f64 / successes as f64
        };
        AttemptStats {
            total,
            successes,
            success_rate,
            mean_latency_ms,
        }
    }
}
