//! Error and warning types.

use crate::signals::GamePhase;

/// Failure reported by a downstream scoring subsystem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("{subsystem} scoring failed: {reason}")]
    Failed {
        subsystem: &'static str,
        reason: String,
    },

    #[error("{subsystem} scoring returned out-of-range value {value}")]
    OutOfRange { subsystem: &'static str, value: i64 },
}

impl ScoringError {
    /// Convenience constructor for subsystem implementations.
    pub fn failed(subsystem: &'static str, reason: impl Into<String>) -> Self {
        ScoringError::Failed {
            subsystem,
            reason: reason.into(),
        }
    }
}

/// Errors loading a controller configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A policy violation found while validating a configuration.
///
/// Warnings never stop the controller; the owning process decides whether
/// to log them or refuse to start.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigWarning {
    #[error("{phase:?} material weight {weight:.2} is below the floor {floor:.2}")]
    MaterialBelowFloor {
        phase: GamePhase,
        weight: f64,
        floor: f64,
    },

    #[error("{phase:?} weights sum to {sum:.3}, expected 1.0")]
    WeightSum { phase: GamePhase, sum: f64 },

    #[error("{phase:?} has a negative {component} weight {weight:.2}")]
    NegativeWeight {
        phase: GamePhase,
        component: &'static str,
        weight: f64,
    },

    #[error(
        "{phase:?} deep bonus {bonus:.2} needs {needed:.2} of positional plus safety weight, only {available:.2} available"
    )]
    DeepBonus {
        phase: GamePhase,
        bonus: f64,
        needed: f64,
        available: f64,
    },

    #[error("{phase:?} deep-tier material share {share:.3} is below the floor {floor:.2}")]
    DeepMaterialBelowFloor {
        phase: GamePhase,
        share: f64,
        floor: f64,
    },

    #[error("panic threshold {panic_ms}ms must be below emergency threshold {emergency_ms}ms")]
    ThresholdOrder { panic_ms: u64, emergency_ms: u64 },

    #[error("safety fraction {name} = {value} is outside (0, 1]")]
    SafetyFraction { name: &'static str, value: f64 },

    #[error("multiplier {name} = {value} must be finite and positive")]
    Multiplier { name: &'static str, value: f64 },

    #[error(
        "eval thresholds must satisfy 0 <= balanced ({balanced}) < contested ({contested}) < decisive ({decisive})"
    )]
    EvalThresholds {
        balanced: i64,
        contested: i64,
        decisive: i64,
    },
}
