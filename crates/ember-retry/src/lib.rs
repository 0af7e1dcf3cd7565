//! Retry and backoff policies.
//!
//! Connection attempts fail constantly during network formation: ports are
//! closed, peers are mid-restart, the coordinator is unreachable. Every
//! component that retries does so through one [`RetryPolicy`] value instead
//! of hand-rolling its own delay loop.
//!
//! A policy is a pure schedule: it maps a retry index to either a delay or
//! "give up". Callers own the sleeping and the actual I/O.

use std::time::Duration;

/// Backoff strategy between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Never retry.
    None,
    /// Retry with no delay.
    Immediate,
    /// Delay grows linearly: `base × (k + 1)` for retry `k`.
    Linear { base: Duration },
    /// Delay doubles: `base × 2^k` for retry `k`.
    Exponential { base: Duration },
}

/// A retry schedule: a backoff strategy, a retry ceiling, and a delay cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Backoff,
    max_retries: u32,
    cap: Duration,
}

/// Ceiling applied to any single computed delay.
const DEFAULT_DELAY_CAP: Duration = Duration::from_secs(30);

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            backoff: Backoff::None,
            max_retries: 0,
            cap: DEFAULT_DELAY_CAP,
        }
    }

    /// Retry up to `max_retries` times with no delay.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            backoff: Backoff::Immediate,
            max_retries,
            cap: DEFAULT_DELAY_CAP,
        }
    }

    /// Retry with linearly growing delays.
    #[must_use]
    pub const fn linear(base: Duration, max_retries: u32) -> Self {
        Self {
            backoff: Backoff::Linear { base },
            max_retries,
            cap: DEFAULT_DELAY_CAP,
        }
    }

    /// Retry with exponentially growing delays (`base × 2^k`).
    #[must_use]
    pub const fn exponential(base: Duration, max_retries: u32) -> Self {
        Self {
            backoff: Backoff::Exponential { base },
            max_retries,
            cap: DEFAULT_DELAY_CAP,
        }
    }

    /// Override the per-delay cap.
    #[must_use]
    pub const fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Maximum number of retries after the initial attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay to wait before retry `k` (zero-indexed), or `None` once the
    /// retry ceiling is reached.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }

        let delay = match self.backoff {
            Backoff::None => return None,
            Backoff::Immediate => Duration::ZERO,
            Backoff::Linear { base } => base.saturating_mul(retry + 1),
            Backoff::Exponential { base } => {
                // 2^k with saturation; retries are small in practice
                let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
        };

        Some(delay.min(self.cap))
    }

    /// The full delay schedule, mostly useful for logging and tests.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries)
            .map_while(|k| self.delay_for(k))
            .collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(250), 3)
    }
}
