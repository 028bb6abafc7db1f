//! Match clock state.
//!
//! One `ClockState` lives for a whole match. It is only mutated between
//! decisions: by [`ClockState::report_used`] after each decision, and by
//! [`ClockState::apply_correction`] when the controlling protocol pushes an
//! authoritative clock value.

use serde::{Deserialize, Serialize};

/// Remaining clock and usage history for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub remaining_ms: u64,
    pub estimated_decisions_left: u32,
    /// Running average of the time actually spent per decision.
    pub historical_average_used_ms: u64,
    pub decisions_observed: u32,
}

impl ClockState {
    /// Creates a fresh clock with no usage history.
    pub fn new(remaining_ms: u64, estimated_decisions_left: u32) -> Self {
        ClockState {
            remaining_ms,
            estimated_decisions_left,
            historical_average_used_ms: 0,
            decisions_observed: 0,
        }
    }

    /// Records a completed decision that took `actual_ms`.
    ///
    /// Deducts the time from the clock, folds it into the running average
    /// and, once more than `history_cap` decisions have been observed,
    /// halves both accumulators so the average keeps adapting. Returns true
    /// if the history was halved.
    pub fn report_used(&mut self, actual_ms: u64, history_cap: u32) -> bool {
        self.remaining_ms = self.remaining_ms.saturating_sub(actual_ms);
        self.estimated_decisions_left = self.estimated_decisions_left.saturating_sub(1).max(1);

        let observed = self.decisions_observed as u128;
        let total = self.historical_average_used_ms as u128 * observed + actual_ms as u128;
        let average = total / (observed + 1);
        self.historical_average_used_ms = u64::try_from(average).unwrap_or(u64::MAX);
        self.decisions_observed = self.decisions_observed.saturating_add(1);

        if self.decisions_observed > history_cap {
            self.historical_average_used_ms /= 2;
            self.decisions_observed /= 2;
            log::debug!(
                "usage history halved: average {}ms over {} decisions",
                self.historical_average_used_ms,
                self.decisions_observed
            );
            return true;
        }
        false
    }

    /// Overwrites the remaining clock with an authoritative value.
    ///
    /// Used for increments and clock syncs from the controlling protocol;
    /// this is the only way the clock may go up.
    pub fn apply_correction(&mut self, remaining_ms: u64) {
        if remaining_ms != self.remaining_ms {
            log::debug!(
                "clock corrected from {}ms to {}ms",
                self.remaining_ms,
                remaining_ms
            );
        }
        self.remaining_ms = remaining_ms;
    }

    pub fn set_estimated_decisions_left(&mut self, decisions: u32) {
        self.estimated_decisions_left = decisions;
    }

    /// True once at least one decision has been reported.
    pub fn has_history(&self) -> bool {
        self.decisions_observed > 0
    }
}
