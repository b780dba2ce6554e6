//! Heuristic Scorer — deterministic baseline, independent of learning.
//!
//! score = Σ(weight_i × feature_i / 100) × Π(multiplier_r for every penalty rule r
//! whose feature is below its floor). Weights are non-negative and penalties only
//! lift as a feature rises past its floor, so the score is monotonic
//! non-decreasing in every feature.

use serde::{Deserialize, Serialize};

use crate::decision::config::{FeatureWeights, PenaltyRule};
use crate::decision::models::{clamp_unit, FeatureVector, FEATURE_COUNT};
use crate::decision::normalizer::CANONICAL_MAX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicBreakdown {
    pub weighted_sum: f64,
    pub penalty_factor: f64,
    pub score: f64,
    pub triggered: Vec<PenaltyRule>,
}

#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    weights: [f64; FEATURE_COUNT],
    penalties: Vec<PenaltyRule>,
}

impl HeuristicScorer {
    pub fn new(weights: &FeatureWeights, penalties: &[PenaltyRule]) -> Self {
        Self {
            weights: weights.as_array(),
            penalties: penalties.to_vec(),
        }
    }

    #[cfg(test)]
    pub fn score(&self, vector: &FeatureVector) -> f64 {
        self.evaluate(vector).score
    }

    pub fn evaluate(&self, vector: &FeatureVector) -> HeuristicBreakdown {
        let weighted_sum: f64 = self
            .weights
            .iter()
            .zip(vector.values())
            .map(|(w, v)| w * (v / CANONICAL_MAX))
            .sum();

        let triggered: Vec<PenaltyRule> = self
            .penalties
            .iter()
            .filter(|rule| vector.get(rule.feature) < rule.floor)
            .copied()
            .collect();
        let penalty_factor: f64 = triggered.iter().map(|rule| rule.multiplier).product();

        HeuristicBreakdown {
            weighted_sum,
            penalty_factor,
            score: clamp_unit(weighted_sum * penalty_factor),
            triggered,
        }
    }
}
