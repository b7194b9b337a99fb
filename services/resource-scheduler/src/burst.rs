//! Burst protection between successive placements.
//!
//! A pod annotated with `burst-protect: N` is not placed until at least `N`
//! seconds have passed since the scheduler's last successful binding, no
//! matter which pod or node that binding concerned.

use std::time::Duration;

use tokio::time::Instant;

/// Outcome of a burst check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstDecision {
    /// The pod may be placed now.
    Proceed,

    /// Too soon after the last placement.
    Wait { elapsed: Duration, window: Duration },
}

/// Time of the last successful placement.
///
/// Owned by the scheduler and only touched under its decision lock.
#[derive(Debug, Clone, Default)]
pub struct BurstGuard {
    last_placement: Option<Instant>,
}

impl BurstGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_placement(&self) -> Option<Instant> {
        self.last_placement
    }

    /// Check whether a pod with the given window may be placed at `now`.
    pub fn check(&self, now: Instant, window: Duration) -> BurstDecision {
        let Some(last) = self.last_placement else {
            return BurstDecision::Proceed;
        };
        if window.is_zero() {
            return BurstDecision::Proceed;
        }

        let elapsed = now.saturating_duration_since(last);
        if elapsed < window {
            BurstDecision::Wait { elapsed, window }
        } else {
            BurstDecision::Proceed
        }
    }

    /// Record a successful placement made at `at`.
    pub fn record(&mut self, at: Instant) {
        self.last_placement = Some(at);
    }
}
