//! Feature Normalizer — turns partial raw input into a complete canonical vector.
//!
//! Every feature ends up on a 0–100 scale. Missing, non-finite and out-of-range
//! inputs never fail the request: they are defaulted or clamped and reported as
//! `FeatureDataError`s, which the engine turns into a confidence penalty.

use crate::decision::errors::FeatureDataError;
use crate::decision::models::{FeatureKind, FeatureVector, RawFeatures, FEATURE_COUNT};

pub const CANONICAL_MAX: f64 = 100.0;

/// Raw input bounds for one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    pub min: f64,
    pub max: f64,
    /// Raw value that maps to the top of the canonical scale.
    pub saturation: f64,
    /// Raw value used when the feature is missing.
    pub default: f64,
}

pub fn bounds(kind: FeatureKind) -> FeatureBounds {
    match kind {
        FeatureKind::Experience => FeatureBounds {
            min: 0.0,
            max: 50.0,
            saturation: 10.0,
            default: 2.0,
        },
        FeatureKind::Education => FeatureBounds {
            min: 0.0,
            max: 10.0,
            saturation: 10.0,
            default: 5.0,
        },
        FeatureKind::Technical
        | FeatureKind::Communication
        | FeatureKind::Leadership
        | FeatureKind::CultureFit => FeatureBounds {
            min: 0.0,
            max: 100.0,
            saturation: 100.0,
            default: 50.0,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub vector: FeatureVector,
    pub issues: Vec<FeatureDataError>,
}

impl Normalized {
    /// Multiplier applied to decision confidence for degraded input.
    pub fn confidence_factor(&self, per_issue_penalty: f64) -> f64 {
        (1.0 - per_issue_penalty).powi(self.issues.len() as i32)
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn normalize(raw: &RawFeatures) -> Normalized {
    let mut values = [0.0; FEATURE_COUNT];
    let mut issues = Vec::new();

    for kind in FeatureKind::ALL {
        let b = bounds(kind);
        let value = match raw.get(kind) {
            None => {
                issues.push(FeatureDataError::Missing(kind));
                b.default
            }
            Some(v) if !v.is_finite() => {
                issues.push(FeatureDataError::NotFinite(kind));
                b.default
            }
            Some(v) if v < b.min || v > b.max => {
                issues.push(FeatureDataError::OutOfRange {
                    feature: kind,
                    value: v,
                    min: b.min,
                    max: b.max,
                });
                v.clamp(b.min, b.max)
            }
            Some(v) => v,
        };
        values[kind.index()] = to_canonical(value, &b);
    }

    Normalized {
        vector: FeatureVector::from_values(values),
        issues,
    }
}

fn to_canonical(value: f64, b: &FeatureBounds) -> f64 {
    ((value - b.min) / (b.saturation - b.min) * CANONICAL_MAX).clamp(0.0, CANONICAL_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> RawFeatures {
        RawFeatures {
            candidate_id: None,
            technical: Some(85.0),
            experience: Some(9.0),
            education: Some(8.0),
            communication: Some(78.0),
            leadership: Some(60.0),
            culture_fit: Some(80.0),
        }
    }

    #[test]
    fn test_complete_input_has_no_issues() {
        let n = normalize(&full());
        assert!(n.is_complete());
        assert_eq!(n.vector.technical, 85.0);
        assert_eq!(n.vector.experience, 90.0);
        assert_eq!(n.vector.education, 80.0);
        assert_eq!(n.confidence_factor(0.05), 1.0);
    }

    #[test]
    fn test_experience_saturates_at_ten_years() {
        let n = normalize(&full().with(FeatureKind::Experience, 25.0));
        assert_eq!(n.vector.experience, 100.0);
        assert!(n.is_complete());
    }

    #[test]
    fn test_missing_feature_is_defaulted_and_reported() {
        let mut raw = full();
        raw.leadership = None;
        let n = normalize(&raw);
        assert_eq!(n.vector.leadership, 50.0);
        assert_eq!(n.issues, vec![FeatureDataError::Missing(FeatureKind::Leadership)]);
        assert!((n.confidence_factor(0.05) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let n = normalize(&full().with(FeatureKind::Technical, 140.0));
        assert_eq!(n.vector.technical, 100.0);
        assert!(matches!(
            n.issues[0],
            FeatureDataError::OutOfRange {
                feature: FeatureKind::Technical,
                ..
            }
        ));

        let n = normalize(&full().with(FeatureKind::Communication, -5.0));
        assert_eq!(n.vector.communication, 0.0);
    }

    #[test]
    fn test_nan_is_treated_as_missing() {
        let n = normalize(&full().with(FeatureKind::CultureFit, f64::NAN));
        assert_eq!(n.vector.culture_fit, 50.0);
        assert_eq!(n.issues, vec![FeatureDataError::NotFinite(FeatureKind::CultureFit)]);
    }

    #[test]
    fn test_empty_input_yields_all_defaults() {
        let n = normalize(&RawFeatures::default());
        assert_eq!(n.issues.len(), FEATURE_COUNT);
        for value in n.vector.values() {
            assert!((0.0..=CANONICAL_MAX).contains(&value));
        }
    }
}
