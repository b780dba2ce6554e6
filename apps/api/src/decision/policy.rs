//! Policy / Blender — merges heuristic and learned scores and picks an action.
//!
//! Algorithm:
//! 1. Heuristic-derived action scores from `h`:
//!    hire = h, reject = 1 − h, consider peaks at the consider threshold and
//!    falls to 0 at a distance of (hire − reject).
//! 2. blendRatio = min(cap, trainingCount / trainingScale).
//! 3. final(a) = blendRatio × Q(s, a) + (1 − blendRatio) × heuristic(a).
//! 4. ε-greedy: with probability ε a uniformly random action, else arg-max
//!    (ties resolve consider, hire, reject).
//! 5. Banding: hire stands only if its score clears the hire threshold, reject
//!    only if its score clears 1 − reject threshold; anything else falls into the
//!    default consider band.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::decision::config::{BlendConfig, DecisionThresholds};
use crate::decision::models::{clamp_unit, Action, ActionValue};

const TIE_ORDER: [Action; 3] = [Action::Consider, Action::Hire, Action::Reject];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyChoice {
    pub action: Action,
    pub confidence: f64,
    /// The action proposed before banding.
    pub proposed: Action,
    pub explored: bool,
    pub scores: ActionValue,
}

impl PolicyChoice {
    pub fn was_banded(&self) -> bool {
        self.proposed != self.action
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Policy {
    thresholds: DecisionThresholds,
    blend: BlendConfig,
}

impl Policy {
    pub fn new(thresholds: DecisionThresholds, blend: BlendConfig) -> Self {
        Self { thresholds, blend }
    }

    pub fn blend_ratio(&self, training_count: u64) -> f64 {
        (training_count as f64 / self.blend.training_scale).min(self.blend.cap)
    }

    pub fn heuristic_scores(&self, h: f64) -> ActionValue {
        let t = self.thresholds;
        let width = t.hire - t.reject;
        let consider = 1.0 - (h - t.consider).abs() / width;
        ActionValue::new(h, consider.max(0.0), 1.0 - h)
    }

    pub fn blend(&self, h: f64, learned: ActionValue, ratio: f64) -> ActionValue {
        let heuristic = self.heuristic_scores(h);
        let mix = |a: Action| {
            ratio * clamp_unit(learned.get(a)) + (1.0 - ratio) * heuristic.get(a)
        };
        ActionValue::new(mix(Action::Hire), mix(Action::Consider), mix(Action::Reject))
    }

    /// Picks an action. The rng is only consulted when `epsilon > 0`.
    pub fn choose(&self, scores: ActionValue, epsilon: f64, rng: &mut dyn RngCore) -> PolicyChoice {
        let explored = epsilon > 0.0 && rng.gen::<f64>() < epsilon;
        let proposed = if explored {
            Action::ALL[rng.gen_range(0..Action::ALL.len())]
        } else {
            greedy(&scores)
        };
        let action = self.band(proposed, &scores);

        PolicyChoice {
            action,
            confidence: clamp_unit(scores.get(action)),
            proposed,
            explored,
            scores,
        }
    }

    fn band(&self, proposed: Action, scores: &ActionValue) -> Action {
        match proposed {
            Action::Hire if scores.hire >= self.thresholds.hire => Action::Hire,
            Action::Reject if scores.reject >= 1.0 - self.thresholds.reject => Action::Reject,
            _ => Action::Consider,
        }
    }
}

fn greedy(scores: &ActionValue) -> Action {
    let mut best = TIE_ORDER[0];
    for action in TIE_ORDER.iter().skip(1) {
        if scores.get(*action) > scores.get(best) {
            best = *action;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::rng::seeded;

    fn policy() -> Policy {
        Policy::new(DecisionThresholds::default(), BlendConfig::default())
    }

    fn decide(h: f64) -> PolicyChoice {
        let p = policy();
        let scores = p.blend(h, ActionValue::uniform(0.5), 0.0);
        p.choose(scores, 0.0, &mut *seeded(0))
    }

    #[test]
    fn test_blend_ratio_grows_then_caps() {
        let p = policy();
        assert_eq!(p.blend_ratio(0), 0.0);
        assert!((p.blend_ratio(500) - 0.05).abs() < 1e-12);
        assert_eq!(p.blend_ratio(1_000_000), 0.35);
    }

    #[test]
    fn test_heuristic_bands() {
        assert_eq!(decide(0.80).action, Action::Hire);
        assert_eq!(decide(0.60).action, Action::Consider);
        assert_eq!(decide(0.40).action, Action::Consider);
        assert_eq!(decide(0.20).action, Action::Reject);
    }

    #[test]
    fn test_hire_below_cutoff_falls_into_consider() {
        // hire score 0.68 beats consider but misses the 0.70 cutoff
        let choice = decide(0.68);
        assert_eq!(choice.proposed, Action::Hire);
        assert_eq!(choice.action, Action::Consider);
        assert!(choice.was_banded());
        assert!((choice.confidence - choice.scores.consider).abs() < 1e-12);
    }

    #[test]
    fn test_learned_values_shift_the_blend() {
        let p = policy();
        let learned = ActionValue::new(1.0, 0.0, 0.0);
        let scores = p.blend(0.5, learned, 0.35);
        assert!((scores.hire - (0.35 + 0.65 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_epsilon_never_explores() {
        let p = policy();
        let scores = p.blend(0.9, ActionValue::uniform(0.5), 0.0);
        let mut rng = seeded(3);
        for _ in 0..100 {
            let choice = p.choose(scores, 0.0, &mut *rng);
            assert!(!choice.explored);
            assert_eq!(choice.action, Action::Hire);
        }
    }

    #[test]
    fn test_full_epsilon_explores_every_action() {
        let p = policy();
        let scores = p.blend(0.5, ActionValue::uniform(0.5), 0.0);
        let mut rng = seeded(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let choice = p.choose(scores, 1.0, &mut *rng);
            assert!(choice.explored);
            seen.insert(choice.proposed);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_confidence_is_within_unit_interval() {
        for i in 0..=100 {
            let choice = decide(i as f64 / 100.0);
            assert!((0.0..=1.0).contains(&choice.confidence));
        }
    }
}
