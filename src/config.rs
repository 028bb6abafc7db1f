//! Controller configuration.
//!
//! All tunables live here with their canonical values as `Default`s. A
//! partial JSON document overrides only the fields it names. The owning
//! process calls [`validate_configuration`] once at startup.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigWarning};
use crate::signals::{GamePhase, ALL_PHASES};

/// Tolerance when checking that a phase's weights sum to one.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Top-level configuration: allocator policy plus evaluation weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub allocator: AllocatorConfig,
    pub weights: WeightTable,
}

impl ControllerConfig {
    /// Parses a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Time allocation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// At or below this remaining clock, the panic regime applies.
    pub panic_threshold_ms: u64,
    pub panic_floor_ms: u64,
    pub panic_divisor: u64,
    /// At or below this remaining clock, the emergency regime applies.
    pub emergency_threshold_ms: u64,
    pub emergency_floor_ms: u64,
    pub emergency_divisor: u64,

    /// Lower bound on the decisions-left divisor for the base time.
    pub min_decisions_divisor: u32,
    pub base_floor_ms: u64,

    pub threat_quiet: f64,
    pub threat_tactical: f64,
    pub threat_urgent: f64,
    pub threat_critical: f64,

    pub phase_opening: f64,
    pub phase_middlegame: f64,
    pub phase_endgame: f64,
    pub phase_critical: f64,

    pub complexity_very_complex: f64,
    pub complexity_simple: f64,

    /// Quick evaluations beyond this magnitude are already decided.
    pub decisive_eval: i64,
    /// Quick evaluations within this magnitude are balanced.
    pub balanced_eval: i64,
    /// Lower magnitude of the "realistic chances" / "must defend" band;
    /// the upper bound is `decisive_eval`.
    pub contested_eval: i64,
    pub eval_decided: f64,
    pub eval_balanced: f64,
    pub winning_chances: f64,
    pub must_defend: f64,

    pub few_decisions_left: u32,
    pub many_decisions_left: u32,
    pub few_decisions_factor: f64,
    pub many_decisions_factor: f64,

    /// Safety fraction when at most `safety_few_decisions` remain.
    pub safety_fraction_few: f64,
    pub safety_few_decisions: u32,
    /// Safety fraction when at most `safety_some_decisions` remain.
    pub safety_fraction_some: f64,
    pub safety_some_decisions: u32,
    pub safety_fraction_many: f64,

    pub min_required_floor_ms: u64,
    pub min_required_divisor: u64,

    /// Multipliers above this are logged as suspicious.
    pub multiplier_ceiling: f64,

    /// Observation count above which the usage history is halved.
    pub history_cap: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            panic_threshold_ms: 3_000,
            panic_floor_ms: 200,
            panic_divisor: 10,
            emergency_threshold_ms: 10_000,
            emergency_floor_ms: 500,
            emergency_divisor: 8,

            min_decisions_divisor: 5,
            base_floor_ms: 500,

            threat_quiet: 0.6,
            threat_tactical: 1.8,
            threat_urgent: 2.5,
            threat_critical: 4.0,

            phase_opening: 0.5,
            phase_middlegame: 1.3,
            phase_endgame: 1.6,
            phase_critical: 2.0,

            complexity_very_complex: 1.7,
            complexity_simple: 0.4,

            decisive_eval: 1_000,
            balanced_eval: 50,
            contested_eval: 200,
            eval_decided: 0.3,
            eval_balanced: 1.4,
            winning_chances: 1.5,
            must_defend: 1.8,

            few_decisions_left: 5,
            many_decisions_left: 30,
            few_decisions_factor: 2.0,
            many_decisions_factor: 0.8,

            safety_fraction_few: 0.8,
            safety_few_decisions: 3,
            safety_fraction_some: 0.4,
            safety_some_decisions: 10,
            safety_fraction_many: 0.25,

            min_required_floor_ms: 300,
            min_required_divisor: 100,

            multiplier_ceiling: 64.0,

            history_cap: 50,
        }
    }
}

impl AllocatorConfig {
    /// Named multipliers, for validation.
    fn multipliers(&self) -> [(&'static str, f64); 17] {
        [
            ("threat_quiet", self.threat_quiet),
            ("threat_tactical", self.threat_tactical),
            ("threat_urgent", self.threat_urgent),
            ("threat_critical", self.threat_critical),
            ("phase_opening", self.phase_opening),
            ("phase_middlegame", self.phase_middlegame),
            ("phase_endgame", self.phase_endgame),
            ("phase_critical", self.phase_critical),
            ("complexity_very_complex", self.complexity_very_complex),
            ("complexity_simple", self.complexity_simple),
            ("eval_decided", self.eval_decided),
            ("eval_balanced", self.eval_balanced),
            ("winning_chances", self.winning_chances),
            ("must_defend", self.must_defend),
            ("few_decisions_factor", self.few_decisions_factor),
            ("many_decisions_factor", self.many_decisions_factor),
            ("multiplier_ceiling", self.multiplier_ceiling),
        ]
    }

    fn validate(&self, warnings: &mut Vec<ConfigWarning>) {
        if self.panic_threshold_ms >= self.emergency_threshold_ms {
            warnings.push(ConfigWarning::ThresholdOrder {
                panic_ms: self.panic_threshold_ms,
                emergency_ms: self.emergency_threshold_ms,
            });
        }
        for (name, value) in [
            ("safety_fraction_few", self.safety_fraction_few),
            ("safety_fraction_some", self.safety_fraction_some),
            ("safety_fraction_many", self.safety_fraction_many),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                warnings.push(ConfigWarning::SafetyFraction { name, value });
            }
        }
        for (name, value) in self.multipliers() {
            if !(value.is_finite() && value > 0.0) {
                warnings.push(ConfigWarning::Multiplier { name, value });
            }
        }
        if !(0 <= self.balanced_eval
            && self.balanced_eval < self.contested_eval
            && self.contested_eval < self.decisive_eval)
        {
            warnings.push(ConfigWarning::EvalThresholds {
                balanced: self.balanced_eval,
                contested: self.contested_eval,
                decisive: self.decisive_eval,
            });
        }
    }
}

/// Blend weights for one game phase.
///
/// `material`, `positional`, `safety`, `tactical` and `threat` sum to one.
/// `deep_bonus` is extra weight on each of tactical and threat in the deep
/// tiers, taken from positional and safety (see [`PhaseWeights::deep`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseWeights {
    pub material: f64,
    pub positional: f64,
    pub safety: f64,
    pub tactical: f64,
    pub threat: f64,
    #[serde(default)]
    pub deep_bonus: f64,
}

impl PhaseWeights {
    fn components(&self) -> [(&'static str, f64); 5] {
        [
            ("material", self.material),
            ("positional", self.positional),
            ("safety", self.safety),
            ("tactical", self.tactical),
            ("threat", self.threat),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.components().iter().map(|(_, w)| w).sum()
    }

    /// Share of the blend carried by material.
    pub fn material_share(&self) -> f64 {
        let sum = self.sum();
        if sum > 0.0 {
            self.material / sum
        } else {
            0.0
        }
    }

    /// Weights used by the deep tiers.
    ///
    /// `deep_bonus` is added to tactical and to threat. The `2 * deep_bonus`
    /// this costs comes out of positional and safety in proportion to their
    /// weights, so material and the total are unchanged. A bonus larger than
    /// positional plus safety can pay for is capped.
    pub fn deep(&self) -> PhaseWeights {
        let donors = self.positional.max(0.0) + self.safety.max(0.0);
        let moved = (2.0 * self.deep_bonus.max(0.0)).min(donors);
        let keep = if donors > 0.0 { 1.0 - moved / donors } else { 1.0 };
        PhaseWeights {
            material: self.material,
            positional: self.positional * keep,
            safety: self.safety * keep,
            tactical: self.tactical + moved / 2.0,
            threat: self.threat + moved / 2.0,
            deep_bonus: 0.0,
        }
    }
}

/// Per-phase evaluation weights and the material floor they must respect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    pub opening: PhaseWeights,
    pub middlegame: PhaseWeights,
    pub endgame: PhaseWeights,
    pub critical: PhaseWeights,
    /// Minimum share of the blend that material must keep.
    pub material_floor: f64,
}

impl Default for WeightTable {
    fn default() -> Self {
        WeightTable {
            opening: PhaseWeights {
                material: 0.60,
                positional: 0.20,
                safety: 0.10,
                tactical: 0.05,
                threat: 0.05,
                deep_bonus: 0.02,
            },
            middlegame: PhaseWeights {
                material: 0.55,
                positional: 0.15,
                safety: 0.12,
                tactical: 0.10,
                threat: 0.08,
                deep_bonus: 0.05,
            },
            endgame: PhaseWeights {
                material: 0.65,
                positional: 0.15,
                safety: 0.05,
                tactical: 0.05,
                threat: 0.10,
                deep_bonus: 0.05,
            },
            critical: PhaseWeights {
                material: 0.55,
                positional: 0.05,
                safety: 0.15,
                tactical: 0.10,
                threat: 0.15,
                deep_bonus: 0.05,
            },
            material_floor: 0.55,
        }
    }
}

impl WeightTable {
    /// Returns the weights for a phase.
    pub fn for_phase(&self, phase: GamePhase) -> &PhaseWeights {
        match phase {
            GamePhase::Opening => &self.opening,
            GamePhase::Middlegame => &self.middlegame,
            GamePhase::Endgame => &self.endgame,
            GamePhase::Critical => &self.critical,
        }
    }

    /// Checks every phase row against the material floor and weight sum,
    /// for both the plain blend and the deep-tier blend.
    pub fn validate(&self) -> Result<(), Vec<ConfigWarning>> {
        let mut warnings = Vec::new();
        self.collect_warnings(&mut warnings);
        if warnings.is_empty() {
            Ok(())
        } else {
            Err(warnings)
        }
    }

    fn collect_warnings(&self, warnings: &mut Vec<ConfigWarning>) {
        for phase in ALL_PHASES {
            let w = self.for_phase(phase);
            if w.material < self.material_floor {
                warnings.push(ConfigWarning::MaterialBelowFloor {
                    phase,
                    weight: w.material,
                    floor: self.material_floor,
                });
            }
            for (component, weight) in w.components() {
                if weight < 0.0 {
                    warnings.push(ConfigWarning::NegativeWeight {
                        phase,
                        component,
                        weight,
                    });
                }
            }
            let sum = w.sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
                warnings.push(ConfigWarning::WeightSum { phase, sum });
            }

            let needed = 2.0 * w.deep_bonus;
            let available = w.positional.max(0.0) + w.safety.max(0.0);
            if w.deep_bonus < 0.0 || needed > available + WEIGHT_SUM_EPSILON {
                warnings.push(ConfigWarning::DeepBonus {
                    phase,
                    bonus: w.deep_bonus,
                    needed,
                    available,
                });
            }
            let share = w.deep().material_share();
            if w.material >= self.material_floor
                && share < self.material_floor - WEIGHT_SUM_EPSILON
            {
                warnings.push(ConfigWarning::DeepMaterialBelowFloor {
                    phase,
                    share,
                    floor: self.material_floor,
                });
            }
        }
    }
}

/// Validates a full configuration. Called once by the owning process.
pub fn validate_configuration(config: &ControllerConfig) -> Result<(), Vec<ConfigWarning>> {
    let mut warnings = Vec::new();
    config.allocator.validate(&mut warnings);
    config.weights.collect_warnings(&mut warnings);
    if warnings.is_empty() {
        Ok(())
    } else {
        Err(warnings)
    }
}
