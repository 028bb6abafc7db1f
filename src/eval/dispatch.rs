//! Tiered evaluation dispatch.
//!
//! One dispatcher serves every tier from a small per-tier recipe instead of
//! one evaluator per tier. Each tier path returns a `Result`; any failure
//! from a downstream subsystem is caught in `score_with_tier` and re-scored
//! on the material-only emergency path, so a broken heuristic degrades
//! quality instead of aborting the search.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{PhaseWeights, WeightTable};
use crate::error::ScoringError;
use crate::position::{Position, ScoringSubsystems, Side};
use crate::signals::classify_phase;

use super::tier::{select_tier, EvaluationTier};

/// Score of a won position at ply 0. Wins found deeper score lower.
pub const WIN_SCORE: i64 = 1_000_000;

/// Largest magnitude a subsystem or blended score may take. Anything beyond
/// it could be confused with a terminal score.
pub const MAX_COMPONENT: i64 = WIN_SCORE / 2;

/// Fixed blitz blend: material, basic safety, fast positional.
const BLITZ_WEIGHTS: [f64; 3] = [0.70, 0.20, 0.10];

/// Scores positions at a chosen tier, recovering from subsystem failures.
pub struct TieredEvaluationDispatcher<S> {
    scorers: S,
    weights: WeightTable,
    fallbacks: AtomicU64,
}

impl<S> TieredEvaluationDispatcher<S> {
    /// Creates a dispatcher. Weight-table violations are logged, not fatal.
    pub fn new(scorers: S, weights: WeightTable) -> Self {
        if let Err(warnings) = weights.validate() {
            for warning in &warnings {
                log::warn!("evaluation weights: {}", warning);
            }
        }
        TieredEvaluationDispatcher {
            scorers,
            weights,
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn scorers(&self) -> &S {
        &self.scorers
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Number of times a tier path failed and fell back to emergency scoring.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Scores a position at the tier implied by the re-sampled clock.
    pub fn score<P>(&self, position: &P, ply: u32, remaining_ms: u64) -> i64
    where
        P: Position + ?Sized,
        S: ScoringSubsystems<P>,
    {
        self.score_with_tier(position, ply, select_tier(remaining_ms))
    }

    /// Scores a position at an explicit tier. Never fails.
    pub fn score_with_tier<P>(&self, position: &P, ply: u32, tier: EvaluationTier) -> i64
    where
        P: Position + ?Sized,
        S: ScoringSubsystems<P>,
    {
        if let Some(score) = terminal_score(position, ply) {
            return score;
        }

        let result = match self.tier_score(position, tier) {
            Err(err) if tier != EvaluationTier::Emergency => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                log::warn!("{} evaluation failed, using emergency tier: {}", tier, err);
                self.emergency(position)
            }
            other => other,
        };

        result.unwrap_or_else(|err| {
            log::error!("emergency evaluation failed, scoring as neutral: {}", err);
            0
        })
    }

    fn tier_score<P>(&self, position: &P, tier: EvaluationTier) -> Result<i64, ScoringError>
    where
        P: Position + ?Sized,
        S: ScoringSubsystems<P>,
    {
        match tier {
            EvaluationTier::Emergency => self.emergency(position),
            EvaluationTier::Blitz => self.blitz(position),
            EvaluationTier::Standard => self.standard(position),
            EvaluationTier::Deep | EvaluationTier::Analysis => self.deep(position),
        }
    }

    fn emergency<P>(&self, position: &P) -> Result<i64, ScoringError>
    where
        P: Position + ?Sized,
        S: ScoringSubsystems<P>,
    {
        checked("material", self.scorers.material_score(position))
    }

    fn blitz<P>(&self, position: &P) -> Result<i64, ScoringError>
    where
        P: Position + ?Sized,
        S: ScoringSubsystems<P>,
    {
        let material = checked("material", self.scorers.material_score(position))?;
        let safety = checked("basic_safety", self.scorers.basic_safety_score(position))?;
        let positional = checked(
            "fast_positional",
            self.scorers.fast_positional_score(position),
        )?;
        Ok(blend(&[
            (material, BLITZ_WEIGHTS[0]),
            (safety, BLITZ_WEIGHTS[1]),
            (positional, BLITZ_WEIGHTS[2]),
        ]))
    }

    fn standard<P>(&self, position: &P) -> Result<i64, ScoringError>
    where
        P: Position + ?Sized,
        S: ScoringSubsystems<P>,
    {
        let w = self.weights.for_phase(classify_phase(position));
        let c = Components {
            material: checked("material", self.scorers.material_score(position))?,
            positional: checked(
                "fast_positional",
                self.scorers.fast_positional_score(position),
            )?,
            safety: checked("basic_safety", self.scorers.basic_safety_score(position))?,
            tactical: checked("tactical", self.scorers.tactical_score(position))?,
            threat: checked("threat", self.scorers.threat_score(position))?,
        };
        Ok(c.blend(w))
    }

    /// Standard blend with each positional and safety term averaged with its
    /// advanced variant, weighted by [`PhaseWeights::deep`].
    fn deep<P>(&self, position: &P) -> Result<i64, ScoringError>
    where
        P: Position + ?Sized,
        S: ScoringSubsystems<P>,
    {
        let w = self.weights.for_phase(classify_phase(position));
        let fast_positional = checked(
            "fast_positional",
            self.scorers.fast_positional_score(position),
        )?;
        let advanced_positional = checked(
            "advanced_positional",
            self.scorers.advanced_positional_score(position),
        )?;
        let basic_safety = checked("basic_safety", self.scorers.basic_safety_score(position))?;
        let advanced_safety = checked(
            "advanced_safety",
            self.scorers.advanced_safety_score(position),
        )?;
        let c = Components {
            material: checked("material", self.scorers.material_score(position))?,
            positional: (fast_positional + advanced_positional) / 2,
            safety: (basic_safety + advanced_safety) / 2,
            tactical: checked("tactical", self.scorers.tactical_score(position))?,
            threat: checked("threat", self.scorers.threat_score(position))?,
        };
        Ok(c.blend(&w.deep()))
    }
}

/// Subsystem outputs for the phase-weighted tiers.
struct Components {
    material: i64,
    positional: i64,
    safety: i64,
    tactical: i64,
    threat: i64,
}

impl Components {
    fn blend(&self, w: &PhaseWeights) -> i64 {
        blend(&[
            (self.material, w.material),
            (self.positional, w.positional),
            (self.safety, w.safety),
            (self.tactical, w.tactical),
            (self.threat, w.threat),
        ])
    }
}

/// Weighted sum, rounded and kept clear of the terminal range.
fn blend(terms: &[(i64, f64)]) -> i64 {
    let sum: f64 = terms.iter().map(|&(v, w)| v as f64 * w).sum();
    if !sum.is_finite() {
        log::warn!("non-finite blended score; scoring as neutral");
        return 0;
    }
    (sum.round() as i64).clamp(-MAX_COMPONENT, MAX_COMPONENT)
}

/// Rejects subsystem values that could be mistaken for terminal scores.
fn checked(
    subsystem: &'static str,
    value: Result<i64, ScoringError>,
) -> Result<i64, ScoringError> {
    let value = value?;
    if value.unsigned_abs() > MAX_COMPONENT as u64 {
        return Err(ScoringError::OutOfRange { subsystem, value });
    }
    Ok(value)
}

/// Sentinel score if the game is over, biased by ply so faster wins and
/// slower losses are preferred.
fn terminal_score<P: Position + ?Sized>(position: &P, ply: u32) -> Option<i64> {
    let win = WIN_SCORE - ply as i64;
    if position.critical_piece_captured(Side::Own) || position.critical_piece_at_goal(Side::Opponent)
    {
        return Some(-win);
    }
    if position.critical_piece_captured(Side::Opponent) || position.critical_piece_at_goal(Side::Own)
    {
        return Some(win);
    }
    None
}
