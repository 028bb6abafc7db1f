//! Tiered position evaluation.
//!
//! Picks a fidelity tier from the remaining clock and runs the matching
//! blend of downstream scoring subsystems, falling back to material-only
//! scoring whenever a subsystem fails.

pub mod dispatch;
pub mod tier;

pub use dispatch::{TieredEvaluationDispatcher, WIN_SCORE};
pub use tier::{select_tier, EvaluationTier, ALL_TIERS};
