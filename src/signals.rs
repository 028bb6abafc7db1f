//! Position signal classifiers.
//!
//! Reads a position and emits three independent signals that drive the
//! time allocator: how urgent the position is ([`ThreatLevel`]), where in
//! the game it sits ([`GamePhase`]) and how hard it is to calculate
//! ([`ComplexityScore`]). All classifiers are pure and deterministic.
//!
//! The constants below are tuning policy. Tests pin down orderings and
//! monotonicity, not the exact coefficients.

use serde::{Deserialize, Serialize};

use crate::position::{Position, ALL_SIDES};

/// Plies within which a reachable goal counts as an immediate threat.
pub const WIN_HORIZON_PLIES: u32 = 2;

/// Tactical move count above which a position is `Tactical`.
pub const TACTICAL_MOVE_THRESHOLD: u32 = 2;

/// Total material at or below which the game is an endgame.
pub const ENDGAME_MATERIAL: u32 = 6;

/// Total material at or above which the game may still be an opening.
pub const OPENING_MATERIAL: u32 = 12;

/// Rows into enemy territory past which a critical piece forces `Endgame`.
pub const ENDGAME_ADVANCE_DEPTH: u32 = 3;

/// Minimum height of a tall stack. [`Position::tall_stack_count`] counts
/// stacks at least this tall.
pub const TALL_STACK_MIN_HEIGHT: u8 = 4;

/// Material imbalance band (inclusive) considered contested.
pub const CONTESTED_IMBALANCE: (i64, i64) = (2, 4);

/// Complexity score at or above which a position is very complex.
pub const VERY_COMPLEX_THRESHOLD: u32 = 15;

/// Complexity score at or below which a position is simple.
pub const SIMPLE_THRESHOLD: u32 = 3;

/// Urgency of the current position, independent of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Quiet,
    Tactical,
    /// A critical piece can be captured next ply.
    UrgentDanger,
    /// A goal is reachable within the horizon or a critical piece is trapped.
    CriticalThreat,
}

/// Coarse game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
    /// Overrides the material-based phases when the game is about to be
    /// decided.
    Critical,
}

/// All phases, in table order.
pub const ALL_PHASES: [GamePhase; 4] = [
    GamePhase::Opening,
    GamePhase::Middlegame,
    GamePhase::Endgame,
    GamePhase::Critical,
];

/// Heuristic calculation difficulty of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub score: u32,
}

impl ComplexityScore {
    pub const fn new(score: u32) -> Self {
        ComplexityScore { score }
    }

    pub const fn is_very_complex(self) -> bool {
        self.score >= VERY_COMPLEX_THRESHOLD
    }

    pub const fn is_simple(self) -> bool {
        self.score <= SIMPLE_THRESHOLD
    }
}

/// The three signals for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub threat: ThreatLevel,
    pub phase: GamePhase,
    pub complexity: ComplexityScore,
}

impl Signals {
    /// Classifies all three signals, computing the threat level once.
    pub fn classify<P: Position + ?Sized>(position: &P) -> Self {
        let threat = classify_threat(position);
        Signals {
            threat,
            phase: phase_for_threat(position, threat),
            complexity: classify_complexity(position),
        }
    }
}

/// True if either side's critical piece is attacked with nowhere to go.
fn critical_piece_trapped<P: Position + ?Sized>(position: &P) -> bool {
    ALL_SIDES.iter().any(|&side| {
        position.is_critical_piece_in_danger(side)
            && position.critical_piece_escape_count(side) == 0
    })
}

/// True if the game can be decided within the win horizon.
fn immediate_decision<P: Position + ?Sized>(position: &P) -> bool {
    ALL_SIDES
        .iter()
        .any(|&side| position.can_reach_goal_within(side, WIN_HORIZON_PLIES))
        || critical_piece_trapped(position)
}

/// Classifies how urgent the position is.
pub fn classify_threat<P: Position + ?Sized>(position: &P) -> ThreatLevel {
    if immediate_decision(position) {
        return ThreatLevel::CriticalThreat;
    }
    if ALL_SIDES
        .iter()
        .any(|&side| position.is_critical_piece_in_danger(side))
    {
        return ThreatLevel::UrgentDanger;
    }
    if position.tactical_move_count() > TACTICAL_MOVE_THRESHOLD {
        return ThreatLevel::Tactical;
    }
    ThreatLevel::Quiet
}

/// Classifies the game phase.
pub fn classify_phase<P: Position + ?Sized>(position: &P) -> GamePhase {
    phase_for_threat(position, classify_threat(position))
}

fn phase_for_threat<P: Position + ?Sized>(position: &P, threat: ThreatLevel) -> GamePhase {
    if threat >= ThreatLevel::UrgentDanger && immediate_decision(position) {
        return GamePhase::Critical;
    }

    let material = position.total_material();
    let deep_advance = ALL_SIDES
        .iter()
        .any(|&side| position.critical_piece_advance(side) > ENDGAME_ADVANCE_DEPTH);
    if material <= ENDGAME_MATERIAL || deep_advance {
        return GamePhase::Endgame;
    }

    let any_danger = ALL_SIDES
        .iter()
        .any(|&side| position.is_critical_piece_in_danger(side));
    if material >= OPENING_MATERIAL && !any_danger {
        return GamePhase::Opening;
    }

    GamePhase::Middlegame
}

/// Scores how hard the position is to calculate.
pub fn classify_complexity<P: Position + ?Sized>(position: &P) -> ComplexityScore {
    let mut score = 0u32;

    let legal = position.legal_move_count();
    if legal > 25 {
        score += 3;
    }
    if legal > 35 {
        score += 2;
    }

    score = score.saturating_add(position.tactical_move_count().saturating_mul(2));

    if ALL_SIDES
        .iter()
        .any(|&side| position.critical_piece_advance(side) > 0)
    {
        score += 4;
    }

    let imbalance = position.material_balance().saturating_abs();
    if (CONTESTED_IMBALANCE.0..=CONTESTED_IMBALANCE.1).contains(&imbalance) {
        score += 3;
    }

    score = score
        .saturating_add(position.tall_stack_count(TALL_STACK_MIN_HEIGHT))
        .saturating_add(position.contact_count());

    ComplexityScore::new(score)
}
