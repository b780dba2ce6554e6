//! Data model shared by every stage of the decision pipeline.
//!
//! Raw candidate signals arrive as `RawFeatures`, are normalised into an
//! immutable `FeatureVector`, and leave the engine as an immutable `Decision`.
//! Outcome feedback flows back in as `Outcome` addressed by a `FeedbackTarget`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::quantizer::StateKey;

// ────────────────────────────────────────────────────────────────────────────
// Features
// ────────────────────────────────────────────────────────────────────────────

pub const FEATURE_COUNT: usize = 6;

/// The six candidate dimensions the engine scores. Order is fixed: it defines
/// the position of each bin inside a `StateKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKind {
    Technical,
    Experience,
    Education,
    Communication,
    Leadership,
    CultureFit,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; FEATURE_COUNT] = [
        FeatureKind::Technical,
        FeatureKind::Experience,
        FeatureKind::Education,
        FeatureKind::Communication,
        FeatureKind::Leadership,
        FeatureKind::CultureFit,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Technical => "technical",
            FeatureKind::Experience => "experience",
            FeatureKind::Education => "education",
            FeatureKind::Communication => "communication",
            FeatureKind::Leadership => "leadership",
            FeatureKind::CultureFit => "cultureFit",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, possibly partial input as produced by upstream extraction.
/// Experience is in years, education is a 0–10 level, the rest are 0–100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub technical: Option<f64>,
    #[serde(default)]
    pub experience: Option<f64>,
    #[serde(default)]
    pub education: Option<f64>,
    #[serde(default)]
    pub communication: Option<f64>,
    #[serde(default)]
    pub leadership: Option<f64>,
    #[serde(default)]
    pub culture_fit: Option<f64>,
}

impl RawFeatures {
    pub fn get(&self, kind: FeatureKind) -> Option<f64> {
        match kind {
            FeatureKind::Technical => self.technical,
            FeatureKind::Experience => self.experience,
            FeatureKind::Education => self.education,
            FeatureKind::Communication => self.communication,
            FeatureKind::Leadership => self.leadership,
            FeatureKind::CultureFit => self.culture_fit,
        }
    }

    pub fn with(mut self, kind: FeatureKind, value: f64) -> Self {
        let slot = match kind {
            FeatureKind::Technical => &mut self.technical,
            FeatureKind::Experience => &mut self.experience,
            FeatureKind::Education => &mut self.education,
            FeatureKind::Communication => &mut self.communication,
            FeatureKind::Leadership => &mut self.leadership,
            FeatureKind::CultureFit => &mut self.culture_fit,
        };
        *slot = Some(value);
        self
    }
}

/// Complete feature vector on the canonical 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub technical: f64,
    pub experience: f64,
    pub education: f64,
    pub communication: f64,
    pub leadership: f64,
    pub culture_fit: f64,
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            technical: values[0],
            experience: values[1],
            education: values[2],
            communication: values[3],
            leadership: values[4],
            culture_fit: values[5],
        }
    }

    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        [
            self.technical,
            self.experience,
            self.education,
            self.communication,
            self.leadership,
            self.culture_fit,
        ]
    }

    pub fn get(&self, kind: FeatureKind) -> f64 {
        self.values()[kind.index()]
    }

    pub fn with(&self, kind: FeatureKind, value: f64) -> Self {
        let mut values = self.values();
        values[kind.index()] = value;
        Self::from_values(values)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Actions and action values
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Hire,
    Consider,
    Reject,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Hire, Action::Consider, Action::Reject];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Hire => "hire",
            Action::Consider => "consider",
            Action::Reject => "reject",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per action. Components are kept in [0, 1] by every writer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub hire: f64,
    pub consider: f64,
    pub reject: f64,
}

impl ActionValue {
    pub fn new(hire: f64, consider: f64, reject: f64) -> Self {
        Self {
            hire: clamp_unit(hire),
            consider: clamp_unit(consider),
            reject: clamp_unit(reject),
        }
    }

    pub fn uniform(value: f64) -> Self {
        Self::new(value, value, value)
    }

    pub fn get(&self, action: Action) -> f64 {
        match action {
            Action::Hire => self.hire,
            Action::Consider => self.consider,
            Action::Reject => self.reject,
        }
    }

    pub fn set(&mut self, action: Action, value: f64) {
        let value = clamp_unit(value);
        match action {
            Action::Hire => self.hire = value,
            Action::Consider => self.consider = value,
            Action::Reject => self.reject = value,
        }
    }

    pub fn max(&self) -> f64 {
        self.hire.max(self.consider).max(self.reject)
    }
}

/// Clamps into [0, 1]; NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Decisions
// ────────────────────────────────────────────────────────────────────────────

/// The engine's verdict for one evaluation request. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    pub action: Action,
    pub confidence: f64,
    pub predicted_success_rate: f64,
    pub q_value: f64,
    pub reasoning: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of a stored decision. Scoring and policy selection happen inside a
/// single call, so only the post-return stages are ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStage {
    /// Returned to the caller; may stay here forever.
    Finalized,
    /// Outcome feedback consumed and applied to the Q-table.
    Trained,
}

/// History entry: the emitted decision plus what is needed to learn from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub decision: Decision,
    pub features: FeatureVector,
    pub state: StateKey,
    pub stage: DecisionStage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionDistribution {
    pub hire: u64,
    pub consider: u64,
    pub reject: u64,
}

impl DecisionDistribution {
    pub fn record(&mut self, action: Action) {
        match action {
            Action::Hire => self.hire += 1,
            Action::Consider => self.consider += 1,
            Action::Reject => self.reject += 1,
        }
    }

    #[cfg(test)]
    pub fn total(&self) -> u64 {
        self.hire + self.consider + self.reject
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Feedback
// ────────────────────────────────────────────────────────────────────────────

/// Which decision an outcome refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackTarget {
    DecisionId(Uuid),
    /// Resolves to the most recent decision for the candidate.
    CandidateId(String),
}

impl fmt::Display for FeedbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackTarget::DecisionId(id) => write!(f, "decision {id}"),
            FeedbackTarget::CandidateId(id) => write!(f, "candidate {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub target: FeedbackTarget,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl BatchOutcome {
    pub fn outcome(&self) -> Outcome {
        Outcome {
            accepted: self.accepted,
            rating: self.rating,
        }
    }
}

/// Consumed feedback, retained for metrics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingFeedback {
    pub decision_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    pub action: Action,
    pub outcome_accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_rating: Option<f64>,
    pub reward: f64,
    pub q_before: f64,
    pub q_after: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FeedbackStatus {
    #[serde(rename_all = "camelCase")]
    Trained { reward: f64, q_value: f64 },
    #[serde(rename_all = "camelCase")]
    Ignored { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
    pub trained: usize,
    pub skipped: usize,
    pub cancelled: bool,
    pub total_training_count: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Insights
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_decisions: u64,
    pub q_table_size: usize,
    pub state_space_size: u64,
    pub exploration_rate: f64,
    pub learning_rate: f64,
    pub blend_ratio: f64,
    pub total_training_count: u64,
    pub average_reward: f64,
    pub ignored_feedback: u64,
    pub history_size: usize,
    pub decision_distribution: DecisionDistribution,
}
