use thiserror::Error;

use crate::decision::models::FeatureKind;

/// Fatal at construction: an engine is never built from an invalid config.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("decision thresholds must satisfy reject < consider < hire within [0, 1] (got reject={reject}, consider={consider}, hire={hire})")]
    ThresholdOrder { reject: f64, consider: f64, hire: f64 },

    #[error("feature weights must sum to 1 (got {sum})")]
    WeightSum { sum: f64 },

    #[error("feature weight for {feature} must be a finite non-negative number (got {weight})")]
    NegativeWeight { feature: FeatureKind, weight: f64 },

    #[error("{field} is out of range (got {value})")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("penalty multiplier for {feature} must lie in (0, 1] (got {multiplier})")]
    PenaltyMultiplier { feature: FeatureKind, multiplier: f64 },

    #[error("state binning is invalid: {0}")]
    Binning(String),

    #[error("bootstrap archetype weights must be positive and sum to 1 (got {sum})")]
    ArchetypeWeights { sum: f64 },

    #[error("maxHistorySize must be at least 1")]
    HistorySize,
}

/// Recoverable input problem. The value is defaulted or clamped, the request
/// still succeeds, and confidence is penalised once per issue.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeatureDataError {
    #[error("{0} is missing; using the neutral default")]
    Missing(FeatureKind),

    #[error("{0} is not a finite number; using the neutral default")]
    NotFinite(FeatureKind),

    #[error("{feature}={value} is outside [{min}, {max}]; clamped")]
    OutOfRange {
        feature: FeatureKind,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Snapshot storage failure. Logged by callers on the decision and training
/// paths, never surfaced to them.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Feedback that cannot be applied. Logged and ignored by the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedbackError {
    #[error("no decision in history for {0}")]
    UnknownTarget(String),

    #[error("decision {0} already received feedback")]
    AlreadyTrained(uuid::Uuid),
}
