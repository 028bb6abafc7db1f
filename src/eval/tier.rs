//! Evaluation tier selection.
//!
//! A pure step function from the remaining clock to a fidelity tier. It is
//! re-evaluated on every scoring call, independently of the allocator, and
//! acts as a second circuit breaker when a long search eats into the clock.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Below this remaining clock, only material is scored.
pub const BLITZ_THRESHOLD_MS: u64 = 200;
pub const STANDARD_THRESHOLD_MS: u64 = 1_000;
pub const DEEP_THRESHOLD_MS: u64 = 5_000;
pub const ANALYSIS_THRESHOLD_MS: u64 = 20_000;

/// Evaluation fidelity, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvaluationTier {
    Emergency,
    Blitz,
    Standard,
    Deep,
    Analysis,
}

/// All tiers, cheapest first.
pub const ALL_TIERS: [EvaluationTier; 5] = [
    EvaluationTier::Emergency,
    EvaluationTier::Blitz,
    EvaluationTier::Standard,
    EvaluationTier::Deep,
    EvaluationTier::Analysis,
];

impl EvaluationTier {
    /// Index into per-tier tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EvaluationTier::Emergency => "emergency",
            EvaluationTier::Blitz => "blitz",
            EvaluationTier::Standard => "standard",
            EvaluationTier::Deep => "deep",
            EvaluationTier::Analysis => "analysis",
        }
    }
}

impl fmt::Display for EvaluationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the current remaining clock to a tier.
pub const fn select_tier(remaining_ms: u64) -> EvaluationTier {
    if remaining_ms < BLITZ_THRESHOLD_MS {
        EvaluationTier::Emergency
    } else if remaining_ms < STANDARD_THRESHOLD_MS {
        EvaluationTier::Blitz
    } else if remaining_ms < DEEP_THRESHOLD_MS {
        EvaluationTier::Standard
    } else if remaining_ms < ANALYSIS_THRESHOLD_MS {
        EvaluationTier::Deep
    } else {
        EvaluationTier::Analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert_eq!(select_tier(0), EvaluationTier::Emergency);
        assert_eq!(select_tier(199), EvaluationTier::Emergency);
        assert_eq!(select_tier(200), EvaluationTier::Blitz);
        assert_eq!(select_tier(999), EvaluationTier::Blitz);
        assert_eq!(select_tier(1_000), EvaluationTier::Standard);
        assert_eq!(select_tier(4_999), EvaluationTier::Standard);
        assert_eq!(select_tier(5_000), EvaluationTier::Deep);
        assert_eq!(select_tier(19_999), EvaluationTier::Deep);
        assert_eq!(select_tier(20_000), EvaluationTier::Analysis);
        assert_eq!(select_tier(u64::MAX), EvaluationTier::Analysis);
    }

    #[test]
    fn never_upgrades_as_clock_drains() {
        let mut previous = select_tier(60_000);
        for remaining in (0..60_000).rev().step_by(37) {
            let tier = select_tier(remaining);
            assert!(tier <= previous);
            previous = tier;
        }
    }

    #[test]
    fn index_matches_table_order() {
        for (i, tier) in ALL_TIERS.iter().enumerate() {
            assert_eq!(tier.index(), i);
        }
        assert_eq!(EvaluationTier::Deep.to_string(), "deep");
    }
}
