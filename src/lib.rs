//! Tempo -- think-time budgeting and tiered evaluation for timed game engines.
//!
//! Decides how many milliseconds to spend on each move of a timed match and
//! which fidelity tier of the scoring function to run, degrading evaluation
//! quality gracefully as the clock runs down. Board representation, move
//! generation and the scoring heuristics themselves are consumed through the
//! [`position::Position`] and [`position::ScoringSubsystems`] traits.

pub mod allocator;
pub mod clock;
pub mod config;
pub mod error;
pub mod eval;
pub mod position;
pub mod signals;
pub mod simulate;
pub mod timer;

pub use allocator::{AllocationDecision, Reason, Regime, SafetyBounds, TimeBudgetAllocator};
pub use clock::ClockState;
pub use config::{validate_configuration, AllocatorConfig, ControllerConfig, PhaseWeights, WeightTable};
pub use error::{ConfigError, ConfigWarning, ScoringError};
pub use eval::{select_tier, EvaluationTier, TieredEvaluationDispatcher};
pub use position::{Position, ScoringSubsystems, Side, Snapshot};
pub use signals::{ComplexityScore, GamePhase, Signals, ThreatLevel};
