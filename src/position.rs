//! Position observations and downstream scoring seams.
//!
//! The controller never inspects a board directly. Everything it needs is
//! read through [`Position`], and the tiered dispatcher reaches the scoring
//! heuristics through [`ScoringSubsystems`]. Both are implemented by the
//! surrounding engine; [`Snapshot`] is a plain-data implementation used by
//! the simulator, the benches and the tests.

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;

/// A side in the game, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The side to move.
    Own,
    /// The side waiting.
    Opponent,
}

/// Both sides, side to move first.
pub const ALL_SIDES: [Side; 2] = [Side::Own, Side::Opponent];

impl Side {
    /// Returns the other side.
    pub const fn opponent(self) -> Side {
        match self {
            Side::Own => Side::Opponent,
            Side::Opponent => Side::Own,
        }
    }

    /// Array index for per-side tables.
    pub const fn index(self) -> usize {
        match self {
            Side::Own => 0,
            Side::Opponent => 1,
        }
    }
}

/// Read-only observations of a position.
///
/// Every method must be pure and cheap: classifiers call several of them on
/// each decision. Evaluations are from the side to move's perspective.
pub trait Position {
    /// True if the side's critical piece can be captured next ply.
    fn is_critical_piece_in_danger(&self, side: Side) -> bool;

    /// Number of safe squares the side's critical piece could move to.
    fn critical_piece_escape_count(&self, side: Side) -> u32;

    /// True if the side can reach its win condition within `plies` plies.
    fn can_reach_goal_within(&self, side: Side, plies: u32) -> bool;

    /// How many rows the side's critical piece has advanced into the
    /// opponent's half. Zero while it stays at home.
    fn critical_piece_advance(&self, side: Side) -> u32;

    /// True if the side's critical piece has been eliminated.
    fn critical_piece_captured(&self, side: Side) -> bool;

    /// True if the side's critical piece stands on its goal square.
    fn critical_piece_at_goal(&self, side: Side) -> bool;

    fn legal_move_count(&self) -> u32;

    /// Captures, checks on the critical piece and other forcing moves.
    fn tactical_move_count(&self) -> u32;

    /// Cheap, non-authoritative static evaluation used for urgency
    /// heuristics only.
    fn quick_evaluation(&self) -> i64;

    /// Total material left on the board, both sides.
    fn total_material(&self) -> u32;

    /// Own material minus opponent material.
    fn material_balance(&self) -> i64;

    /// Number of stacks (either side) at least `min_height` tall.
    fn tall_stack_count(&self, min_height: u8) -> u32;

    /// Number of orthogonally adjacent opposing piece pairs, each pair once.
    fn contact_count(&self) -> u32;
}

/// The downstream scoring subsystems, one method per subsystem.
///
/// Each is independently fallible; the dispatcher recovers from any error.
pub trait ScoringSubsystems<P: Position + ?Sized> {
    fn material_score(&self, position: &P) -> Result<i64, ScoringError>;
    fn basic_safety_score(&self, position: &P) -> Result<i64, ScoringError>;
    fn fast_positional_score(&self, position: &P) -> Result<i64, ScoringError>;
    fn advanced_positional_score(&self, position: &P) -> Result<i64, ScoringError>;
    fn advanced_safety_score(&self, position: &P) -> Result<i64, ScoringError>;
    fn tactical_score(&self, position: &P) -> Result<i64, ScoringError>;
    fn threat_score(&self, position: &P) -> Result<i64, ScoringError>;
}

/// A position described entirely by its observations.
///
/// Per-side arrays are indexed by [`Side::index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub in_danger: [bool; 2],
    pub escape_squares: [u32; 2],
    /// Plies each side needs to reach its goal, if reachable at all.
    pub plies_to_goal: [Option<u32>; 2],
    pub advance: [u32; 2],
    pub captured: [bool; 2],
    pub at_goal: [bool; 2],
    pub legal_moves: u32,
    pub tactical_moves: u32,
    pub quick_eval: i64,
    pub material: [u32; 2],
    pub stack_heights: Vec<u8>,
    pub contacts: u32,
}

impl Default for Snapshot {
    /// A quiet, full-material opening position.
    fn default() -> Self {
        Snapshot {
            in_danger: [false; 2],
            escape_squares: [4; 2],
            plies_to_goal: [None; 2],
            advance: [0; 2],
            captured: [false; 2],
            at_goal: [false; 2],
            legal_moves: 20,
            tactical_moves: 0,
            quick_eval: 0,
            material: [7; 2],
            stack_heights: vec![1; 14],
            contacts: 0,
        }
    }
}

impl Position for Snapshot {
    fn is_critical_piece_in_danger(&self, side: Side) -> bool {
        self.in_danger[side.index()]
    }

    fn critical_piece_escape_count(&self, side: Side) -> u32 {
        self.escape_squares[side.index()]
    }

    fn can_reach_goal_within(&self, side: Side, plies: u32) -> bool {
        matches!(self.plies_to_goal[side.index()], Some(p) if p <= plies)
    }

    fn critical_piece_advance(&self, side: Side) -> u32 {
        self.advance[side.index()]
    }

    fn critical_piece_captured(&self, side: Side) -> bool {
        self.captured[side.index()]
    }

    fn critical_piece_at_goal(&self, side: Side) -> bool {
        self.at_goal[side.index()]
    }

    fn legal_move_count(&self) -> u32 {
        self.legal_moves
    }

    fn tactical_move_count(&self) -> u32 {
        self.tactical_moves
    }

    fn quick_evaluation(&self) -> i64 {
        self.quick_eval
    }

    fn total_material(&self) -> u32 {
        self.material[0] + self.material[1]
    }

    fn material_balance(&self) -> i64 {
        self.material[0] as i64 - self.material[1] as i64
    }

    fn tall_stack_count(&self, min_height: u8) -> u32 {
        self.stack_heights.iter().filter(|&&h| h >= min_height).count() as u32
    }

    fn contact_count(&self) -> u32 {
        self.contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_round_trips() {
        for side in ALL_SIDES {
            assert_eq!(side.opponent().opponent(), side);
            assert_ne!(side.opponent(), side);
        }
    }

    #[test]
    fn default_snapshot_is_balanced() {
        let s = Snapshot::default();
        assert_eq!(s.material_balance(), 0);
        assert_eq!(s.total_material(), 14);
        assert_eq!(s.tall_stack_count(2), 0);
        assert!(!s.can_reach_goal_within(Side::Own, 2));
    }

    #[test]
    fn goal_horizon_is_inclusive() {
        let s = Snapshot {
            plies_to_goal: [Some(2), Some(3)],
            ..Snapshot::default()
        };
        assert!(s.can_reach_goal_within(Side::Own, 2));
        assert!(!s.can_reach_goal_within(Side::Opponent, 2));
        assert!(s.can_reach_goal_within(Side::Opponent, 3));
    }

    #[test]
    fn snapshot_partial_json_uses_defaults() {
        let s: Snapshot = serde_json::from_str(r#"{"tactical_moves": 5}"#).unwrap();
        assert_eq!(s.tactical_moves, 5);
        assert_eq!(s.legal_moves, Snapshot::default().legal_moves);
    }
}
