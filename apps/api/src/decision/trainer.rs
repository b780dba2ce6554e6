//! Trainer / Reward Function.
//!
//! Outcome feedback becomes a reward, scaled by the confidence of the decision
//! it grades, and is folded into the Q-table with a one-step Bellman update
//! against the "improved" neighbour state.

use serde::{Deserialize, Serialize};

use crate::decision::config::{EngineConfig, RewardTable};
use crate::decision::models::{clamp_unit, Action, Outcome};
use crate::decision::q_table::QTable;
use crate::decision::quantizer::StateKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingBand {
    High,
    Mid,
    Low,
}

impl RatingBand {
    /// 1–5 scale: ≥ 4 high, ≤ 2 low, anything else (or no rating) mid.
    pub fn from_rating(rating: Option<f64>) -> Self {
        match rating {
            Some(r) if r >= 4.0 => RatingBand::High,
            Some(r) if r <= 2.0 => RatingBand::Low,
            _ => RatingBand::Mid,
        }
    }
}

/// Unscaled reward for grading `action` with `outcome`.
pub fn base_reward(table: &RewardTable, action: Action, outcome: &Outcome) -> f64 {
    let band = RatingBand::from_rating(outcome.rating);
    match (action, outcome.accepted, band) {
        (Action::Hire, true, RatingBand::High) => table.hire_accepted_high,
        (Action::Hire, true, RatingBand::Mid) => table.hire_accepted_mid,
        (Action::Hire, true, RatingBand::Low) => table.hire_accepted_low,
        (Action::Hire, false, _) => table.hire_declined,
        (Action::Consider, true, RatingBand::High) => table.consider_accepted_high,
        (Action::Consider, true, RatingBand::Mid) => table.consider_accepted_mid,
        (Action::Consider, true, RatingBand::Low) => table.consider_accepted_low,
        (Action::Consider, false, _) => table.consider_declined,
        (Action::Reject, false, _) => table.reject_declined,
        (Action::Reject, true, RatingBand::High) => table.reject_accepted_high,
        (Action::Reject, true, _) => table.reject_accepted_other,
    }
}

/// `r · (0.5 + 0.5 · confidence)`
pub fn scaled_reward(table: &RewardTable, action: Action, outcome: &Outcome, confidence: f64) -> f64 {
    base_reward(table, action, outcome) * (0.5 + 0.5 * clamp_unit(confidence))
}

// ────────────────────────────────────────────────────────────────────────────
// Schedules
// ────────────────────────────────────────────────────────────────────────────

/// Hyperbolic decay with a floor: `max(floor, base / (1 + n / horizon))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningSchedule {
    learning_rate: f64,
    min_learning_rate: f64,
    exploration_rate: f64,
    min_exploration_rate: f64,
    horizon: f64,
    deterministic: bool,
}

impl LearningSchedule {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            min_learning_rate: config.min_learning_rate,
            exploration_rate: config.exploration_rate,
            min_exploration_rate: config.min_exploration_rate,
            horizon: config.decay_horizon,
            deterministic: config.deterministic,
        }
    }

    fn decay(&self, base: f64, floor: f64, training_count: u64) -> f64 {
        (base / (1.0 + training_count as f64 / self.horizon)).max(floor.min(base))
    }

    pub fn learning_rate(&self, training_count: u64) -> f64 {
        self.decay(self.learning_rate, self.min_learning_rate, training_count)
    }

    pub fn exploration_rate(&self, training_count: u64) -> f64 {
        if self.deterministic {
            return 0.0;
        }
        self.decay(self.exploration_rate, self.min_exploration_rate, training_count)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bellman update
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BellmanStep {
    pub before: f64,
    pub after: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Trainer {
    discount_factor: f64,
    improved_step: u8,
    max_bin: u8,
}

impl Trainer {
    pub fn new(discount_factor: f64, improved_step: u8, max_bin: u8) -> Self {
        Self {
            discount_factor,
            improved_step,
            max_bin,
        }
    }

    /// `Q(s,a) ← Q(s,a) + α · (r + γ · max_a' Q(s',a') − Q(s,a))`, clamped to [0, 1].
    pub fn update(
        &self,
        table: &mut QTable,
        state: StateKey,
        action: Action,
        reward: f64,
        alpha: f64,
    ) -> BellmanStep {
        let before = table.get(&state).get(action);
        let next = state.improved(self.improved_step, self.max_bin);
        let target = reward + self.discount_factor * table.get(&next).max();
        let after = clamp_unit(before + alpha * (target - before));
        table.set(state, action, after);
        BellmanStep {
            before,
            after,
            target,
        }
    }
}
