//! Cooperative decision timer for the search driver.
//!
//! The controller never interrupts a search. The driver starts a
//! `DecisionTimer` once the allocation is known, polls it every few
//! thousand nodes, and stops iterating on its own:
//!
//! - hard limit: stop as soon as the allocation is spent
//! - soft limit: don't start another iterative-deepening pass past half of it

use std::time::{Duration, Instant};

use crate::allocator::AllocationDecision;
use crate::clock::ClockState;
use crate::eval::tier::{select_tier, EvaluationTier};

/// Nodes between clock polls. Must be a power of two.
pub const POLL_INTERVAL_NODES: u64 = 2048;

/// Tracks elapsed time against one decision's allocation.
#[derive(Debug, Clone, Copy)]
pub struct DecisionTimer {
    started: Instant,
    remaining_at_start_ms: u64,
    allocated_ms: u64,
}

impl DecisionTimer {
    /// Starts timing a decision now.
    pub fn start(clock: &ClockState, decision: &AllocationDecision) -> Self {
        Self::start_at(Instant::now(), clock, decision)
    }

    /// Starts timing from an explicit instant.
    pub fn start_at(started: Instant, clock: &ClockState, decision: &AllocationDecision) -> Self {
        DecisionTimer {
            started,
            remaining_at_start_ms: clock.remaining_ms,
            allocated_ms: decision.allocated_ms,
        }
    }

    pub fn allocated_ms(&self) -> u64 {
        self.allocated_ms
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Remaining match clock as of now.
    pub fn remaining_clock_ms(&self) -> u64 {
        self.remaining_at(self.elapsed_ms())
    }

    /// Remaining match clock after `elapsed_ms` of thinking.
    pub fn remaining_at(&self, elapsed_ms: u64) -> u64 {
        self.remaining_at_start_ms.saturating_sub(elapsed_ms)
    }

    /// Tier for the re-sampled clock.
    pub fn current_tier(&self) -> EvaluationTier {
        select_tier(self.remaining_clock_ms())
    }

    /// True once the whole allocation has been spent.
    pub fn hard_limit_reached(&self) -> bool {
        self.elapsed_ms() >= self.allocated_ms
    }

    /// True while less than half the allocation has been spent.
    pub fn should_start_iteration(&self) -> bool {
        self.elapsed_ms() < self.allocated_ms / 2
    }

    /// True on the node counts at which the driver should poll the clock.
    pub const fn poll_due(nodes: u64) -> bool {
        nodes & (POLL_INTERVAL_NODES - 1) == 0
    }
}
