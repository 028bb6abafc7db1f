//! Think-time allocation.
//!
//! Decides how many milliseconds the search may spend on the current
//! decision. Two hard circuit breakers (panic and emergency) short-circuit
//! all reasoning when the clock is low. Otherwise a base time derived from
//! the clock and usage history is scaled by independent multipliers keyed
//! on the position signals, then clamped to safety bounds so that no single
//! decision can starve the ones after it.
//!
//! The allocator never fails and never panics: divisions are guarded, and
//! a non-finite product falls back to the minimum safe time.

use serde::Serialize;

use crate::clock::ClockState;
use crate::config::AllocatorConfig;
use crate::position::Position;
use crate::signals::{ComplexityScore, GamePhase, Signals, ThreatLevel};

/// Which branch of the allocator produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Regime {
    Panic,
    Emergency,
    Normal,
}

/// Why a multiplier was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reason {
    QuietPosition,
    TacticalPosition,
    UrgentDanger,
    CriticalThreat,
    OpeningPhase,
    MiddlegamePhase,
    EndgamePhase,
    CriticalPhase,
    VeryComplex,
    Simple,
    AlreadyDecided,
    Balanced,
    WinningChances,
    MustDefend,
    FewDecisionsLeft,
    ManyDecisionsLeft,
}

impl Reason {
    /// Stable label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Reason::QuietPosition => "quiet",
            Reason::TacticalPosition => "tactical",
            Reason::UrgentDanger => "urgent-danger",
            Reason::CriticalThreat => "critical-threat",
            Reason::OpeningPhase => "opening",
            Reason::MiddlegamePhase => "middlegame",
            Reason::EndgamePhase => "endgame",
            Reason::CriticalPhase => "critical-phase",
            Reason::VeryComplex => "very-complex",
            Reason::Simple => "simple",
            Reason::AlreadyDecided => "already-decided",
            Reason::Balanced => "balanced",
            Reason::WinningChances => "winning-chances",
            Reason::MustDefend => "must-defend",
            Reason::FewDecisionsLeft => "few-decisions-left",
            Reason::ManyDecisionsLeft => "many-decisions-left",
        }
    }
}

/// The clamp applied on the normal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyBounds {
    pub min_required_ms: u64,
    pub max_safe_ms: u64,
}

/// Result of one allocation, with its diagnostic breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationDecision {
    pub allocated_ms: u64,
    pub regime: Regime,
    /// Base time before multipliers. Zero on the panic/emergency paths.
    pub base_ms: u64,
    /// Product of every applied multiplier. 1.0 on the panic/emergency paths.
    pub multiplier: f64,
    /// Present on the normal path only.
    pub bounds: Option<SafetyBounds>,
    /// Each applied multiplier, in application order.
    pub breakdown: Vec<(Reason, f64)>,
}

impl AllocationDecision {
    fn circuit_breaker(allocated_ms: u64, regime: Regime) -> Self {
        AllocationDecision {
            allocated_ms,
            regime,
            base_ms: 0,
            multiplier: 1.0,
            bounds: None,
            breakdown: Vec::new(),
        }
    }

    /// Renders the breakdown as `reason=x1.50 ...` for logging.
    pub fn breakdown_summary(&self) -> String {
        self.breakdown
            .iter()
            .map(|(reason, factor)| format!("{}=x{:.2}", reason.as_str(), factor))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Collects multipliers and their reasons.
struct Multipliers {
    product: f64,
    breakdown: Vec<(Reason, f64)>,
}

impl Multipliers {
    fn new() -> Self {
        Multipliers {
            product: 1.0,
            breakdown: Vec::with_capacity(8),
        }
    }

    fn apply(&mut self, reason: Reason, factor: f64) {
        self.product *= factor;
        self.breakdown.push((reason, factor));
    }
}

/// Think-time allocator. Stateless apart from its configuration; all match
/// state lives in the caller's [`ClockState`].
#[derive(Debug, Clone, Default)]
pub struct TimeBudgetAllocator {
    config: AllocatorConfig,
}

impl TimeBudgetAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        TimeBudgetAllocator { config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Classifies the position and allocates time for the current decision.
    pub fn allocate<P: Position + ?Sized>(
        &self,
        clock: &ClockState,
        position: &P,
    ) -> AllocationDecision {
        // The breakers skip classification entirely.
        if let Some(decision) = self.circuit_breaker(clock) {
            return decision;
        }
        let signals = Signals::classify(position);
        self.allocate_normal(clock, &signals, position.quick_evaluation())
    }

    /// Allocates time from precomputed signals and quick evaluation.
    pub fn allocate_with_signals(
        &self,
        clock: &ClockState,
        signals: &Signals,
        quick_eval: i64,
    ) -> AllocationDecision {
        match self.circuit_breaker(clock) {
            Some(decision) => decision,
            None => self.allocate_normal(clock, signals, quick_eval),
        }
    }

    /// Panic and emergency regimes. `None` when the clock is healthy.
    fn circuit_breaker(&self, clock: &ClockState) -> Option<AllocationDecision> {
        let cfg = &self.config;
        let remaining = clock.remaining_ms;

        if remaining <= cfg.panic_threshold_ms {
            let ms = (remaining / cfg.panic_divisor.max(1))
                .max(cfg.panic_floor_ms)
                .min(remaining);
            log::debug!("panic allocation: {}ms of {}ms remaining", ms, remaining);
            return Some(AllocationDecision::circuit_breaker(ms, Regime::Panic));
        }

        if remaining <= cfg.emergency_threshold_ms {
            let ms = (remaining / cfg.emergency_divisor.max(1))
                .max(cfg.emergency_floor_ms)
                .min(remaining);
            log::debug!("emergency allocation: {}ms of {}ms remaining", ms, remaining);
            return Some(AllocationDecision::circuit_breaker(ms, Regime::Emergency));
        }

        None
    }

    fn allocate_normal(
        &self,
        clock: &ClockState,
        signals: &Signals,
        quick_eval: i64,
    ) -> AllocationDecision {
        let cfg = &self.config;
        let base_ms = self.base_time(clock);
        let multipliers = self.multipliers(clock, signals, quick_eval);
        let bounds = self.safety_bounds(clock);

        let raw = base_ms as f64 * multipliers.product;
        let allocated_ms = if !raw.is_finite() || !multipliers.product.is_finite() {
            log::warn!(
                "non-finite allocation (base {}ms, multiplier {}); using minimum {}ms",
                base_ms,
                multipliers.product,
                bounds.min_required_ms
            );
            bounds.min_required_ms
        } else {
            if multipliers.product > cfg.multiplier_ceiling {
                log::warn!(
                    "multiplier {:.2} exceeds ceiling {:.2}",
                    multipliers.product,
                    cfg.multiplier_ceiling
                );
            }
            // `as` saturates on out-of-range floats.
            (raw.max(0.0) as u64).clamp(bounds.min_required_ms, bounds.max_safe_ms)
        };

        let decision = AllocationDecision {
            allocated_ms,
            regime: Regime::Normal,
            base_ms,
            multiplier: multipliers.product,
            bounds: Some(bounds),
            breakdown: multipliers.breakdown,
        };
        log::debug!(
            "allocated {}ms (base {}ms x{:.2}, bounds {}..{}ms): {}",
            decision.allocated_ms,
            base_ms,
            decision.multiplier,
            bounds.min_required_ms,
            bounds.max_safe_ms,
            decision.breakdown_summary()
        );
        decision
    }

    /// Records the time actually spent on a decision.
    ///
    /// Returns true if the usage history was halved.
    pub fn report_used(&self, clock: &mut ClockState, actual_ms: u64) -> bool {
        clock.report_used(actual_ms, self.config.history_cap)
    }

    /// Even share of the clock, blended with the historical average.
    fn base_time(&self, clock: &ClockState) -> u64 {
        let cfg = &self.config;
        let divisor = clock
            .estimated_decisions_left
            .max(cfg.min_decisions_divisor)
            .max(1);
        let mut base = clock.remaining_ms / divisor as u64;
        if clock.has_history() {
            base = midpoint(base, clock.historical_average_used_ms);
        }
        base.max(cfg.base_floor_ms)
    }

    fn multipliers(&self, clock: &ClockState, signals: &Signals, quick_eval: i64) -> Multipliers {
        let cfg = &self.config;
        let mut m = Multipliers::new();

        let (reason, factor) = match signals.threat {
            ThreatLevel::Quiet => (Reason::QuietPosition, cfg.threat_quiet),
            ThreatLevel::Tactical => (Reason::TacticalPosition, cfg.threat_tactical),
            ThreatLevel::UrgentDanger => (Reason::UrgentDanger, cfg.threat_urgent),
            ThreatLevel::CriticalThreat => (Reason::CriticalThreat, cfg.threat_critical),
        };
        m.apply(reason, factor);

        let (reason, factor) = match signals.phase {
            GamePhase::Opening => (Reason::OpeningPhase, cfg.phase_opening),
            GamePhase::Middlegame => (Reason::MiddlegamePhase, cfg.phase_middlegame),
            GamePhase::Endgame => (Reason::EndgamePhase, cfg.phase_endgame),
            GamePhase::Critical => (Reason::CriticalPhase, cfg.phase_critical),
        };
        m.apply(reason, factor);

        if let Some((reason, factor)) = self.complexity_factor(signals.complexity) {
            m.apply(reason, factor);
        }

        let magnitude = quick_eval.saturating_abs();
        if magnitude > cfg.decisive_eval {
            m.apply(Reason::AlreadyDecided, cfg.eval_decided);
        } else if magnitude < cfg.balanced_eval {
            m.apply(Reason::Balanced, cfg.eval_balanced);
        }

        let left = clock.estimated_decisions_left;
        if left <= cfg.few_decisions_left {
            m.apply(Reason::FewDecisionsLeft, cfg.few_decisions_factor);
        } else if left >= cfg.many_decisions_left {
            m.apply(Reason::ManyDecisionsLeft, cfg.many_decisions_factor);
        }

        if quick_eval > cfg.contested_eval && quick_eval <= cfg.decisive_eval {
            m.apply(Reason::WinningChances, cfg.winning_chances);
        } else if quick_eval < cfg.contested_eval.saturating_neg()
            && quick_eval >= cfg.decisive_eval.saturating_neg()
        {
            m.apply(Reason::MustDefend, cfg.must_defend);
        }

        m
    }

    fn complexity_factor(&self, complexity: ComplexityScore) -> Option<(Reason, f64)> {
        if complexity.is_very_complex() {
            Some((Reason::VeryComplex, self.config.complexity_very_complex))
        } else if complexity.is_simple() {
            Some((Reason::Simple, self.config.complexity_simple))
        } else {
            None
        }
    }

    fn safety_bounds(&self, clock: &ClockState) -> SafetyBounds {
        let cfg = &self.config;
        let remaining = clock.remaining_ms;
        let left = clock.estimated_decisions_left;
        let fraction = if left <= cfg.safety_few_decisions {
            cfg.safety_fraction_few
        } else if left <= cfg.safety_some_decisions {
            cfg.safety_fraction_some
        } else {
            cfg.safety_fraction_many
        };
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let max_safe_ms = ((remaining as f64 * fraction) as u64).min(remaining);
        let min_required_ms = (remaining / cfg.min_required_divisor.max(1))
            .max(cfg.min_required_floor_ms)
            .min(max_safe_ms);
        SafetyBounds {
            min_required_ms,
            max_safe_ms,
        }
    }
}

/// Overflow-free `(a + b) / 2`.
fn midpoint(a: u64, b: u64) -> u64 {
    ((a as u128 + b as u128) / 2) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Snapshot;

    fn signals(threat: ThreatLevel, phase: GamePhase, complexity: u32) -> Signals {
        Signals {
            threat,
            phase,
            complexity: ComplexityScore::new(complexity),
        }
    }

    fn middling() -> Signals {
        signals(ThreatLevel::Tactical, GamePhase::Middlegame, 8)
    }

    #[test]
    fn panic_path() {
        let alloc = TimeBudgetAllocator::default();
        let d = alloc.allocate(&ClockState::new(2_500, 20), &Snapshot::default());
        assert_eq!(d.regime, Regime::Panic);
        assert_eq!(d.allocated_ms, 250);
        assert!(d.breakdown.is_empty());
    }

    #[test]
    fn panic_floor_never_exceeds_clock() {
        let alloc = TimeBudgetAllocator::default();
        for remaining in [0, 1, 150, 199, 200, 1_999, 2_000, 3_000] {
            let d = alloc.allocate_with_signals(&ClockState::new(remaining, 10), &middling(), 0);
            assert_eq!(d.regime, Regime::Panic);
            assert!(d.allocated_ms <= remaining, "{} > {}", d.allocated_ms, remaining);
            if remaining >= 200 {
                assert!(d.allocated_ms >= 200);
            }
            assert!(d.allocated_ms <= (remaining / 10).max(200));
        }
    }

    #[test]
    fn emergency_path() {
        let alloc = TimeBudgetAllocator::default();
        let d = alloc.allocate(&ClockState::new(8_000, 1), &Snapshot::default());
        assert_eq!(d.regime, Regime::Emergency);
        assert_eq!(d.allocated_ms, 1_000);

        let d = alloc.allocate(&ClockState::new(3_001, 40), &Snapshot::default());
        assert_eq!(d.allocated_ms, 500);
    }

    #[test]
    fn quiet_simple_opening_hits_minimum() {
        let alloc = TimeBudgetAllocator::default();
        let clock = ClockState::new(60_000, 20);
        let d = alloc.allocate_with_signals(
            &clock,
            &signals(ThreatLevel::Quiet, GamePhase::Opening, 1),
            100,
        );
        assert_eq!(d.regime, Regime::Normal);
        assert_eq!(d.base_ms, 3_000);
        assert!((d.multiplier - 0.6 * 0.5 * 0.4).abs() < 1e-9);
        assert_eq!(d.bounds.unwrap().min_required_ms, 600);
        assert_eq!(d.allocated_ms, 600);
    }

    #[test]
    fn critical_position_is_capped_by_safety_fraction() {
        let alloc = TimeBudgetAllocator::default();
        let clock = ClockState::new(60_000, 3);
        let d = alloc.allocate_with_signals(
            &clock,
            &signals(ThreatLevel::CriticalThreat, GamePhase::Critical, 8),
            0,
        );
        assert!(d.multiplier >= 8.0);
        assert_eq!(d.bounds.unwrap().max_safe_ms, 48_000);
        assert_eq!(d.allocated_ms, 48_000);
    }

    #[test]
    fn allocation_stays_within_bounds() {
        let alloc = TimeBudgetAllocator::default();
        let threats = [
            ThreatLevel::Quiet,
            ThreatLevel::Tactical,
            ThreatLevel::UrgentDanger,
            ThreatLevel::CriticalThreat,
        ];
        for remaining in [10_001, 25_000, 90_000, 600_000, 10_000_000] {
            for left in [0, 1, 3, 4, 10, 11, 29, 30, 80] {
                for &threat in &threats {
                    for phase in crate::signals::ALL_PHASES {
                        for eval in [-5_000, -500, -10, 0, 300, 5_000] {
                            let clock = ClockState::new(remaining, left);
                            let d = alloc.allocate_with_signals(
                                &clock,
                                &signals(threat, phase, 20),
                                eval,
                            );
                            let b = d.bounds.unwrap();
                            assert!(b.min_required_ms <= b.max_safe_ms);
                            assert!(b.max_safe_ms <= remaining);
                            assert!(d.allocated_ms >= b.min_required_ms);
                            assert!(d.allocated_ms <= b.max_safe_ms);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn complexity_is_monotonic() {
        let alloc = TimeBudgetAllocator::default();
        let clock = ClockState::new(120_000, 25);
        let mut previous = 0.0;
        for score in [0, 3, 4, 10, 14, 15, 30] {
            let d = alloc.allocate_with_signals(
                &clock,
                &signals(ThreatLevel::Tactical, GamePhase::Middlegame, score),
                100,
            );
            assert!(d.multiplier >= previous, "score {} decreased multiplier", score);
            previous = d.multiplier;
        }
    }

    #[test]
    fn eval_bands_select_situational_factors() {
        let alloc = TimeBudgetAllocator::default();
        let clock = ClockState::new(120_000, 20);
        let reasons = |eval| {
            alloc
                .allocate_with_signals(&clock, &middling(), eval)
                .breakdown
                .into_iter()
                .map(|(r, _)| r)
                .collect::<Vec<_>>()
        };
        assert!(reasons(2_000).contains(&Reason::AlreadyDecided));
        assert!(reasons(-2_000).contains(&Reason::AlreadyDecided));
        assert!(reasons(10).contains(&Reason::Balanced));
        assert!(reasons(500).contains(&Reason::WinningChances));
        assert!(reasons(-500).contains(&Reason::MustDefend));
        let neutral = reasons(100);
        assert!(!neutral.contains(&Reason::WinningChances));
        assert!(!neutral.contains(&Reason::Balanced));
    }

    #[test]
    fn breakdown_product_matches_multiplier() {
        let alloc = TimeBudgetAllocator::default();
        let clock = ClockState::new(200_000, 40);
        let d = alloc.allocate_with_signals(
            &clock,
            &signals(ThreatLevel::UrgentDanger, GamePhase::Endgame, 16),
            -400,
        );
        let product: f64 = d.breakdown.iter().map(|(_, f)| f).product();
        assert!((product - d.multiplier).abs() < 1e-9);
        assert!(d.breakdown_summary().contains("must-defend=x1.80"));
        assert!(d.breakdown_summary().contains("many-decisions-left=x0.80"));
    }

    #[test]
    fn history_blends_into_base_time() {
        let alloc = TimeBudgetAllocator::default();
        let mut clock = ClockState::new(100_000, 20);
        let before = alloc.allocate_with_signals(&clock, &middling(), 100);
        assert_eq!(before.base_ms, 5_000);

        alloc.report_used(&mut clock, 9_000);
        // 91_000 / 19 = 4_789, blended with the 9_000 average.
        let after = alloc.allocate_with_signals(&clock, &middling(), 100);
        assert_eq!(after.base_ms, (91_000 / 19 + 9_000) / 2);
    }

    #[test]
    fn zero_decisions_left_is_guarded() {
        let alloc = TimeBudgetAllocator::default();
        let clock = ClockState::new(50_000, 0);
        let d = alloc.allocate_with_signals(&clock, &middling(), 0);
        assert_eq!(d.base_ms, 10_000);
        assert!(d.allocated_ms <= 40_000);
    }

    #[test]
    fn absurd_config_falls_back_to_minimum() {
        let config = AllocatorConfig {
            threat_tactical: f64::INFINITY,
            ..AllocatorConfig::default()
        };
        let alloc = TimeBudgetAllocator::new(config);
        let clock = ClockState::new(100_000, 20);
        let d = alloc.allocate_with_signals(&clock, &middling(), 100);
        assert_eq!(d.allocated_ms, d.bounds.unwrap().min_required_ms);
    }

    #[test]
    fn extreme_eval_thresholds_do_not_overflow() {
        let config = AllocatorConfig {
            contested_eval: i64::MIN,
            decisive_eval: i64::MIN,
            ..AllocatorConfig::default()
        };
        let alloc = TimeBudgetAllocator::new(config);
        let clock = ClockState::new(100_000, 20);
        for eval in [i64::MIN, -500, 0, 500, i64::MAX] {
            let d = alloc.allocate_with_signals(&clock, &middling(), eval);
            let bounds = d.bounds.unwrap();
            assert!(d.allocated_ms >= bounds.min_required_ms);
            assert!(d.allocated_ms <= bounds.max_safe_ms);
        }
    }

    #[test]
    fn classifies_position_on_normal_path() {
        let alloc = TimeBudgetAllocator::default();
        let position = Snapshot {
            tactical_moves: 4,
            material: [5, 5],
            ..Snapshot::default()
        };
        let d = alloc.allocate(&ClockState::new(60_000, 20), &position);
        assert_eq!(d.breakdown[0].0, Reason::TacticalPosition);
        assert_eq!(d.breakdown[1].0, Reason::MiddlegamePhase);
    }
}
