//! Synthetic timed-match simulation.
//!
//! Plays whole matches against the allocator with random positions and
//! random thinking times, the way a self-play harness exercises an engine.
//! Each match records how the clock evolved, which regimes and tiers were
//! used, and whether the clock ran out. Matches run in parallel on
//! a rayon pool when `threads > 1`.

use std::io::Write;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::allocator::{Regime, TimeBudgetAllocator};
use crate::clock::ClockState;
use crate::eval::tier::ALL_TIERS;
use crate::position::Snapshot;
use crate::signals::Signals;
use crate::timer::DecisionTimer;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub matches: usize,
    /// Decisions per match before it is scored as complete.
    pub decisions_per_match: u32,
    pub initial_clock_ms: u64,
    /// Clock increment granted after every decision.
    pub increment_ms: u64,
    /// Decisions-left estimate handed to the clock at the start.
    pub estimated_decisions: u32,
    /// Range of the fraction of each allocation the simulated search uses.
    /// Values above 1.0 model searches that overrun their budget.
    pub usage_min: f64,
    pub usage_max: f64,
    /// Random seed (0 = use entropy).
    pub seed: u64,
    pub threads: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            matches: 8,
            decisions_per_match: 60,
            initial_clock_ms: 300_000,
            increment_ms: 0,
            estimated_decisions: 40,
            usage_min: 0.5,
            usage_max: 1.0,
            seed: 0,
            threads: 4,
        }
    }
}

/// Per-regime decision counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeCounts {
    pub panic: u32,
    pub emergency: u32,
    pub normal: u32,
}

impl RegimeCounts {
    fn record(&mut self, regime: Regime) {
        match regime {
            Regime::Panic => self.panic += 1,
            Regime::Emergency => self.emergency += 1,
            Regime::Normal => self.normal += 1,
        }
    }
}

/// Outcome of one simulated match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: usize,
    pub decisions: u32,
    pub final_remaining_ms: u64,
    /// Lowest clock seen right after a search, before any increment.
    pub min_remaining_ms: u64,
    pub total_used_ms: u64,
    pub largest_allocation_ms: u64,
    /// True if the clock ran out: a search used all of the time that was
    /// left, or more. The match stops at that decision.
    pub exhausted: bool,
    pub history_halvings: u32,
    pub regimes: RegimeCounts,
    /// Decisions ending in each tier, cheapest first.
    pub tier_counts: [u32; 5],
}

impl MatchRecord {
    /// Renders the record as a single JSON line.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Draws a plausible position for the given match progress (0.0 to 1.0).
pub fn random_snapshot(rng: &mut SmallRng, progress: f64) -> Snapshot {
    let progress = progress.clamp(0.0, 1.0);
    let max_material = (7.0 - 6.0 * progress).round().max(1.0) as u32;
    let material = [
        rng.gen_range(1..=max_material),
        rng.gen_range(1..=max_material),
    ];
    let stacks = rng.gen_range(2..=10usize);
    let stack_heights = (0..stacks).map(|_| rng.gen_range(1..=7u8)).collect();

    let mut plies_to_goal = [None; 2];
    for slot in plies_to_goal.iter_mut() {
        if rng.gen_bool(0.1 + 0.3 * progress) {
            *slot = Some(rng.gen_range(1..=8));
        }
    }

    Snapshot {
        in_danger: [rng.gen_bool(0.1), rng.gen_bool(0.1)],
        escape_squares: [rng.gen_range(0..=4), rng.gen_range(0..=4)],
        plies_to_goal,
        advance: [
            rng.gen_range(0..=(6.0 * progress) as u32),
            rng.gen_range(0..=(6.0 * progress) as u32),
        ],
        captured: [false; 2],
        at_goal: [false; 2],
        legal_moves: rng.gen_range(5..=45),
        tactical_moves: rng.gen_range(0..=6),
        quick_eval: rng.gen_range(-1_500..=1_500),
        material,
        stack_heights,
        contacts: rng.gen_range(0..=6),
    }
}

/// Plays a single match.
pub fn simulate_match(
    config: &SimulationConfig,
    allocator: &TimeBudgetAllocator,
    match_id: usize,
    rng: &mut SmallRng,
) -> MatchRecord {
    let mut clock = ClockState::new(config.initial_clock_ms, config.estimated_decisions);
    let usage_min = config.usage_min.max(0.0);
    let usage_max = config.usage_max.max(usage_min);

    let mut record = MatchRecord {
        match_id,
        decisions: 0,
        final_remaining_ms: clock.remaining_ms,
        min_remaining_ms: clock.remaining_ms,
        total_used_ms: 0,
        largest_allocation_ms: 0,
        exhausted: false,
        history_halvings: 0,
        regimes: RegimeCounts::default(),
        tier_counts: [0; 5],
    };

    for i in 0..config.decisions_per_match {
        let progress = i as f64 / config.decisions_per_match.max(1) as f64;
        let position = random_snapshot(rng, progress);
        let signals = Signals::classify(&position);
        let decision = allocator.allocate_with_signals(&clock, &signals, position.quick_eval);
        record.regimes.record(decision.regime);
        record.largest_allocation_ms = record.largest_allocation_ms.max(decision.allocated_ms);

        let timer = DecisionTimer::start(&clock, &decision);
        let fraction = rng.gen_range(usage_min..=usage_max);
        let mut used = (decision.allocated_ms as f64 * fraction) as u64;
        if used >= clock.remaining_ms {
            record.exhausted = true;
            used = clock.remaining_ms;
        }
        let tier = crate::eval::select_tier(timer.remaining_at(used));
        record.tier_counts[tier.index()] += 1;

        if allocator.report_used(&mut clock, used) {
            record.history_halvings += 1;
        }
        record.decisions += 1;
        record.total_used_ms = record.total_used_ms.saturating_add(used);
        record.min_remaining_ms = record.min_remaining_ms.min(clock.remaining_ms);

        if record.exhausted {
            break;
        }
        if config.increment_ms > 0 {
            clock.apply_correction(clock.remaining_ms.saturating_add(config.increment_ms));
        }
    }

    record.final_remaining_ms = clock.remaining_ms;
    log::debug!(
        "match {}: {} decisions, {}ms left (min {}ms), exhausted={}",
        match_id,
        record.decisions,
        record.final_remaining_ms,
        record.min_remaining_ms,
        record.exhausted
    );
    record
}

fn match_rng(seed: u64, match_id: usize) -> SmallRng {
    if seed != 0 {
        SmallRng::seed_from_u64(seed.wrapping_add(match_id as u64))
    } else {
        SmallRng::from_entropy()
    }
}

/// Plays every configured match, in parallel when `threads > 1`.
///
/// Records are returned in match order. Each match seeds its own generator
/// from `seed + match_id`, so results do not depend on the thread count.
pub fn run_simulation(
    config: &SimulationConfig,
    allocator: &TimeBudgetAllocator,
) -> Vec<MatchRecord> {
    if config.threads > 1 {
        use rayon::prelude::*;

        let play = || {
            (0..config.matches)
                .into_par_iter()
                .map(|i| simulate_match(config, allocator, i, &mut match_rng(config.seed, i)))
                .collect::<Vec<_>>()
        };
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
        {
            Ok(pool) => pool.install(play),
            Err(err) => {
                log::warn!("failed to build simulation thread pool, using global pool: {}", err);
                play()
            }
        }
    } else {
        (0..config.matches)
            .map(|i| simulate_match(config, allocator, i, &mut match_rng(config.seed, i)))
            .collect()
    }
}

/// Writes records as JSONL (one JSON object per match, one per line).
pub fn write_jsonl<W: Write>(records: &[MatchRecord], out: &mut W) -> std::io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)?;
    }
    out.flush()
}

/// Aggregate statistics over a set of matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub matches: usize,
    pub exhausted: usize,
    pub mean_final_remaining_ms: f64,
    pub min_remaining_ms: u64,
    pub tier_counts: [u32; 5],
}

/// Summarizes a set of match records.
pub fn summarize(records: &[MatchRecord]) -> SimulationSummary {
    let mut summary = SimulationSummary {
        matches: records.len(),
        min_remaining_ms: u64::MAX,
        ..SimulationSummary::default()
    };
    let mut final_total = 0u128;
    for r in records {
        if r.exhausted {
            summary.exhausted += 1;
        }
        final_total += r.final_remaining_ms as u128;
        summary.min_remaining_ms = summary.min_remaining_ms.min(r.min_remaining_ms);
        for tier in ALL_TIERS {
            summary.tier_counts[tier.index()] += r.tier_counts[tier.index()];
        }
    }
    if records.is_empty() {
        summary.min_remaining_ms = 0;
    } else {
        summary.mean_final_remaining_ms = final_total as f64 / records.len() as f64;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            matches: 6,
            seed,
            threads: 1,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn single_match_completes_without_overrun() {
        let cfg = SimulationConfig {
            estimated_decisions: 60,
            ..config(42)
        };
        let mut rng = SmallRng::seed_from_u64(42);
        let record = simulate_match(&cfg, &TimeBudgetAllocator::default(), 0, &mut rng);
        assert_eq!(record.decisions, cfg.decisions_per_match);
        assert!(!record.exhausted);
        assert!(record.min_remaining_ms > 0);
        assert_eq!(
            record.final_remaining_ms,
            cfg.initial_clock_ms - record.total_used_ms
        );
        let regimes = record.regimes;
        assert_eq!(
            regimes.panic + regimes.emergency + regimes.normal,
            record.decisions
        );
        assert_eq!(record.tier_counts.iter().sum::<u32>(), record.decisions);
    }

    #[test]
    fn tiny_clock_drained_to_zero_is_flagged() {
        let cfg = SimulationConfig {
            initial_clock_ms: 4_000,
            decisions_per_match: 200,
            usage_min: 1.0,
            usage_max: 1.0,
            ..config(7)
        };
        let mut rng = SmallRng::seed_from_u64(7);
        let record = simulate_match(&cfg, &TimeBudgetAllocator::default(), 0, &mut rng);
        assert!(record.regimes.panic > 0);
        assert!(record.exhausted);
        assert_eq!(record.final_remaining_ms, 0);
        assert_eq!(record.min_remaining_ms, 0);
        assert_eq!(record.total_used_ms, cfg.initial_clock_ms);
    }

    #[test]
    fn tiny_clock_with_matching_increment_holds_steady() {
        // 4000ms sits in the emergency band, whose 500ms floor the increment repays.
        let cfg = SimulationConfig {
            initial_clock_ms: 4_000,
            increment_ms: 500,
            decisions_per_match: 200,
            usage_min: 1.0,
            usage_max: 1.0,
            ..config(7)
        };
        let mut rng = SmallRng::seed_from_u64(7);
        let record = simulate_match(&cfg, &TimeBudgetAllocator::default(), 0, &mut rng);
        assert!(!record.exhausted);
        assert_eq!(record.decisions, 200);
        assert_eq!(record.regimes.emergency, 200);
        assert_eq!(record.min_remaining_ms, 3_500);
        assert_eq!(record.final_remaining_ms, 4_000);
    }

    #[test]
    fn overrunning_searches_are_flagged() {
        let cfg = SimulationConfig {
            initial_clock_ms: 5_000,
            decisions_per_match: 500,
            usage_min: 3.0,
            usage_max: 4.0,
            ..config(3)
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let record = simulate_match(&cfg, &TimeBudgetAllocator::default(), 0, &mut rng);
        assert!(record.exhausted);
        assert_eq!(record.final_remaining_ms, 0);
    }

    #[test]
    fn seeded_runs_are_reproducible_across_thread_counts() {
        let allocator = TimeBudgetAllocator::default();
        let sequential = run_simulation(&config(99), &allocator);
        let parallel = run_simulation(
            &SimulationConfig {
                threads: 3,
                ..config(99)
            },
            &allocator,
        );
        assert_eq!(sequential.len(), 6);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn increments_keep_the_clock_healthy() {
        let cfg = SimulationConfig {
            initial_clock_ms: 30_000,
            increment_ms: 2_000,
            decisions_per_match: 120,
            ..config(11)
        };
        let records = run_simulation(&cfg, &TimeBudgetAllocator::default());
        let summary = summarize(&records);
        assert_eq!(summary.matches, 6);
        assert_eq!(summary.exhausted, 0);
        assert!(summary.min_remaining_ms > 0);
    }

    #[test]
    fn jsonl_output_is_valid() {
        let records = run_simulation(&config(55), &TimeBudgetAllocator::default());
        let mut buf = Vec::new();
        write_jsonl(&records, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), records.len());
        for (line, record) in lines.iter().zip(&records) {
            let parsed: MatchRecord = serde_json::from_str(line).unwrap();
            assert_eq!(&parsed, record);
            assert_eq!(record.to_json_line().unwrap(), *line);
        }
    }

    #[test]
    fn random_snapshots_respect_progress() {
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..100 {
            let late = random_snapshot(&mut rng, 1.0);
            assert!(late.material.iter().all(|&m| m == 1));
            let early = random_snapshot(&mut rng, 0.0);
            assert_eq!(early.advance, [0, 0]);
        }
    }

    #[test]
    fn empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.matches, 0);
        assert_eq!(summary.min_remaining_ms, 0);
    }
}
