//! Engine configuration: validated once at construction, immutable afterwards.
//! Reloading means building a new engine from a new config.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::decision::errors::ConfigValidationError;
use crate::decision::models::{Action, ActionValue, FeatureKind, FEATURE_COUNT};

/// Allowed drift of the weight sum away from 1.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Sections
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub hire: f64,
    pub consider: f64,
    pub reject: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            hire: 0.70,
            consider: 0.55,
            reject: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureWeights {
    pub technical: f64,
    pub experience: f64,
    pub education: f64,
    pub communication: f64,
    pub leadership: f64,
    pub culture_fit: f64,
}

impl FeatureWeights {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.technical,
            self.experience,
            self.education,
            self.communication,
            self.leadership,
            self.culture_fit,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            technical: 0.30,
            experience: 0.20,
            education: 0.10,
            communication: 0.15,
            leadership: 0.10,
            culture_fit: 0.15,
        }
    }
}

/// `feature < floor` multiplies the heuristic score by `multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRule {
    pub feature: FeatureKind,
    pub floor: f64,
    pub multiplier: f64,
}

pub fn default_penalties() -> Vec<PenaltyRule> {
    vec![
        PenaltyRule {
            feature: FeatureKind::Technical,
            floor: 40.0,
            multiplier: 0.6,
        },
        PenaltyRule {
            feature: FeatureKind::Communication,
            floor: 40.0,
            multiplier: 0.8,
        },
        PenaltyRule {
            feature: FeatureKind::CultureFit,
            floor: 30.0,
            multiplier: 0.7,
        },
    ]
}

/// How fast learned values take over from the heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendConfig {
    pub cap: f64,
    pub training_scale: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            cap: 0.35,
            training_scale: 10_000.0,
        }
    }
}

/// Uniform binning on the canonical 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateBinning {
    pub bin_width: f64,
    pub max_bin: u8,
}

impl Default for StateBinning {
    fn default() -> Self {
        Self {
            bin_width: 10.0,
            max_bin: 10,
        }
    }
}

/// Rewards keyed by (predicted action, accepted, rating band).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTable {
    pub hire_accepted_high: f64,
    pub hire_accepted_mid: f64,
    pub hire_accepted_low: f64,
    pub hire_declined: f64,
    pub consider_accepted_high: f64,
    pub consider_accepted_mid: f64,
    pub consider_accepted_low: f64,
    pub consider_declined: f64,
    pub reject_declined: f64,
    pub reject_accepted_high: f64,
    pub reject_accepted_other: f64,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            hire_accepted_high: 1.0,
            hire_accepted_mid: 0.5,
            hire_accepted_low: -0.3,
            hire_declined: -1.0,
            consider_accepted_high: 0.4,
            consider_accepted_mid: 0.3,
            consider_accepted_low: -0.1,
            consider_declined: 0.1,
            reject_declined: 0.6,
            reject_accepted_high: -0.8,
            reject_accepted_other: -0.4,
        }
    }
}

/// Business-policy cutoffs for the safeguard layer (canonical 0–100 scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeguardThresholds {
    pub technical_override: f64,
    pub well_rounded_floor: f64,
    pub communication_floor: f64,
    pub culture_floor: f64,
}

impl Default for SafeguardThresholds {
    fn default() -> Self {
        Self {
            technical_override: 80.0,
            well_rounded_floor: 75.0,
            communication_floor: 30.0,
            culture_floor: 25.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EngineConfig
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Stamped into snapshots; a mismatch on import is logged.
    pub version: String,
    pub learning_rate: f64,
    pub min_learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub min_exploration_rate: f64,
    /// Training count at which learning and exploration rates have halved.
    pub decay_horizon: f64,
    pub decision_thresholds: DecisionThresholds,
    pub feature_weights: FeatureWeights,
    pub penalty_multipliers: Vec<PenaltyRule>,
    pub blend: BlendConfig,
    pub binning: StateBinning,
    pub default_action_value: ActionValue,
    pub rewards: RewardTable,
    pub safeguards: SafeguardThresholds,
    /// Bins added to every feature to form the Bellman next state.
    pub improved_state_step: u8,
    /// Confidence is multiplied by `1 - featureIssuePenalty` per input issue.
    pub feature_issue_penalty: f64,
    pub bootstrap_corpus_size: usize,
    pub bootstrap_seed: u64,
    pub max_history_size: usize,
    /// Forces exploration to zero.
    pub deterministic: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            learning_rate: 0.1,
            min_learning_rate: 0.01,
            discount_factor: 0.9,
            exploration_rate: 0.1,
            min_exploration_rate: 0.01,
            decay_horizon: 5_000.0,
            decision_thresholds: DecisionThresholds::default(),
            feature_weights: FeatureWeights::default(),
            penalty_multipliers: default_penalties(),
            blend: BlendConfig::default(),
            binning: StateBinning::default(),
            default_action_value: ActionValue::uniform(0.5),
            rewards: RewardTable::default(),
            safeguards: SafeguardThresholds::default(),
            improved_state_step: 1,
            feature_issue_penalty: 0.05,
            bootstrap_corpus_size: 500,
            bootstrap_seed: 42,
            max_history_size: 1_000,
            deterministic: false,
        }
    }
}

impl EngineConfig {
    /// Loads a (possibly partial) JSON config; omitted fields take defaults.
    /// The result is not validated here; `DecisionEngine::init` does that.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse engine config '{}'", path.display()))
    }

    pub fn deterministic(mut self) -> Self {
        self.deterministic = true;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let t = self.decision_thresholds;
        let ordered = 0.0 <= t.reject && t.reject < t.consider && t.consider < t.hire && t.hire <= 1.0;
        if !ordered {
            return Err(ConfigValidationError::ThresholdOrder {
                reject: t.reject,
                consider: t.consider,
                hire: t.hire,
            });
        }

        for (kind, weight) in FeatureKind::ALL.iter().zip(self.feature_weights.as_array()) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigValidationError::NegativeWeight {
                    feature: *kind,
                    weight,
                });
            }
        }
        let sum = self.feature_weights.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigValidationError::WeightSum { sum });
        }

        check_range("learningRate", self.learning_rate, |v| v > 0.0 && v <= 1.0)?;
        check_range("minLearningRate", self.min_learning_rate, |v| {
            v > 0.0 && v <= self.learning_rate
        })?;
        check_range("discountFactor", self.discount_factor, |v| (0.0..1.0).contains(&v))?;
        check_range("explorationRate", self.exploration_rate, |v| (0.0..=1.0).contains(&v))?;
        // the floor never lifts exploration above a lower base rate
        check_range("minExplorationRate", self.min_exploration_rate, |v| {
            (0.0..=1.0).contains(&v)
        })?;
        check_range("decayHorizon", self.decay_horizon, |v| v > 0.0)?;
        check_range("blend.cap", self.blend.cap, |v| (0.0..=1.0).contains(&v))?;
        check_range("blend.trainingScale", self.blend.training_scale, |v| v > 0.0)?;
        check_range("featureIssuePenalty", self.feature_issue_penalty, |v| {
            (0.0..1.0).contains(&v)
        })?;
        for action in Action::ALL {
            check_range("defaultActionValue", self.default_action_value.get(action), |v| {
                (0.0..=1.0).contains(&v)
            })?;
        }

        for rule in &self.penalty_multipliers {
            if !(rule.multiplier > 0.0 && rule.multiplier <= 1.0) || !rule.floor.is_finite() {
                return Err(ConfigValidationError::PenaltyMultiplier {
                    feature: rule.feature,
                    multiplier: rule.multiplier,
                });
            }
        }

        let b = self.binning;
        if !(b.bin_width.is_finite() && b.bin_width > 0.0) {
            return Err(ConfigValidationError::Binning(format!(
                "binWidth must be positive (got {})",
                b.bin_width
            )));
        }
        if b.max_bin == 0 || b.max_bin == u8::MAX {
            return Err(ConfigValidationError::Binning(format!(
                "maxBin must lie in 1..=254 (got {})",
                b.max_bin
            )));
        }

        if self.max_history_size == 0 {
            return Err(ConfigValidationError::HistorySize);
        }
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    ok: impl Fn(f64) -> bool,
) -> Result<(), ConfigValidationError> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(ConfigValidationError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_weights_summing_to_point_eight_are_rejected() {
        let mut config = EngineConfig::default();
        config.feature_weights.technical = 0.10;
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigValidationError::WeightSum { sum } if (sum - 0.8).abs() < 1e-9),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_zero_exploration_is_accepted() {
        let config: EngineConfig = serde_json::from_str(r#"{"explorationRate": 0}"#).unwrap();
        assert_eq!(config.exploration_rate, 0.0);
        assert_eq!(config.validate(), Ok(()));

        let mut config = EngineConfig::default();
        config.min_exploration_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::OutOfRange {
                field: "minExplorationRate",
                ..
            })
        ));
    }

    #[test]
    fn test_threshold_order_is_enforced() {
        let mut config = EngineConfig::default();
        config.decision_thresholds.consider = 0.75;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::ThresholdOrder { .. })
        ));

        let mut config = EngineConfig::default();
        config.decision_thresholds.reject = 0.55;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn test_negative_weight_is_rejected_even_if_sum_is_one() {
        let mut config = EngineConfig::default();
        config.feature_weights.technical = 0.5;
        config.feature_weights.leadership = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::NegativeWeight {
                feature: FeatureKind::Leadership,
                ..
            })
        ));
    }

    #[test]
    fn test_penalty_multiplier_must_be_a_discount() {
        let mut config = EngineConfig::default();
        config.penalty_multipliers[0].multiplier = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::PenaltyMultiplier { .. })
        ));
    }

    #[test]
    fn test_learning_rate_floor_cannot_exceed_base() {
        let config = EngineConfig {
            min_learning_rate: 0.2,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::OutOfRange {
                field: "minLearningRate",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"learningRate":0.2,"decisionThresholds":{{"hire":0.8,"consider":0.6,"reject":0.3}}}}"#
        )
        .unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.learning_rate, 0.2);
        assert_eq!(config.decision_thresholds.hire, 0.8);
        assert_eq!(config.discount_factor, 0.9);
        assert_eq!(config.max_history_size, 1_000);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EngineConfig::from_json_file("/nonexistent/engine.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.json"));
    }
}
