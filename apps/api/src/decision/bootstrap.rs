//! Bootstrapper — synthetic warm-start corpus.
//!
//! A fixed mixture of candidate archetypes is sampled with a seeded ChaCha
//! stream, so the same seed always yields the same corpus (and therefore the
//! same warm-started Q-table).

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::decision::config::WEIGHT_TOLERANCE;
use crate::decision::errors::ConfigValidationError;
use crate::decision::models::{Outcome, RawFeatures};

/// Inclusive raw-value range.
pub type Range = (f64, f64);

#[derive(Debug, Clone, PartialEq)]
pub struct Archetype {
    pub name: &'static str,
    pub weight: f64,
    pub technical: Range,
    pub experience: Range,
    pub education: Range,
    pub communication: Range,
    pub leadership: Range,
    pub culture_fit: Range,
    pub acceptance_probability: f64,
    /// Rating drawn (as a whole number) when the outcome is accepted.
    pub rating: (u8, u8),
}

pub fn default_archetypes() -> Vec<Archetype> {
    vec![
        Archetype {
            name: "junior",
            weight: 0.25,
            technical: (40.0, 70.0),
            experience: (0.0, 2.0),
            education: (4.0, 8.0),
            communication: (40.0, 75.0),
            leadership: (10.0, 40.0),
            culture_fit: (50.0, 85.0),
            acceptance_probability: 0.45,
            rating: (2, 4),
        },
        Archetype {
            name: "mid-level",
            weight: 0.25,
            technical: (55.0, 80.0),
            experience: (3.0, 6.0),
            education: (5.0, 8.0),
            communication: (50.0, 80.0),
            leadership: (30.0, 60.0),
            culture_fit: (50.0, 85.0),
            acceptance_probability: 0.60,
            rating: (3, 4),
        },
        Archetype {
            name: "senior-leader",
            weight: 0.15,
            technical: (70.0, 95.0),
            experience: (8.0, 20.0),
            education: (6.0, 10.0),
            communication: (70.0, 95.0),
            leadership: (70.0, 95.0),
            culture_fit: (65.0, 95.0),
            acceptance_probability: 0.85,
            rating: (4, 5),
        },
        Archetype {
            name: "technical-specialist-weak-communicator",
            weight: 0.15,
            technical: (80.0, 100.0),
            experience: (4.0, 15.0),
            education: (6.0, 10.0),
            communication: (20.0, 45.0),
            leadership: (10.0, 40.0),
            culture_fit: (35.0, 65.0),
            acceptance_probability: 0.50,
            rating: (3, 5),
        },
        Archetype {
            name: "weak-fit",
            weight: 0.20,
            technical: (10.0, 45.0),
            experience: (0.0, 5.0),
            education: (2.0, 6.0),
            communication: (15.0, 50.0),
            leadership: (5.0, 35.0),
            culture_fit: (10.0, 45.0),
            acceptance_probability: 0.10,
            rating: (1, 3),
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSample {
    pub archetype: &'static str,
    pub raw: RawFeatures,
    pub outcome: Outcome,
}

pub struct Bootstrapper {
    archetypes: Vec<Archetype>,
    index: WeightedIndex<f64>,
    rng: ChaCha8Rng,
}

impl Bootstrapper {
    pub fn new(archetypes: Vec<Archetype>, seed: u64) -> Result<Self, ConfigValidationError> {
        let sum: f64 = archetypes.iter().map(|a| a.weight).sum();
        if archetypes.is_empty() || (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigValidationError::ArchetypeWeights { sum });
        }
        let index = WeightedIndex::new(archetypes.iter().map(|a| a.weight))
            .map_err(|_| ConfigValidationError::ArchetypeWeights { sum })?;

        Ok(Self {
            archetypes,
            index,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn with_defaults(seed: u64) -> Result<Self, ConfigValidationError> {
        Self::new(default_archetypes(), seed)
    }

    fn sample_range(&mut self, range: Range) -> f64 {
        if range.0 >= range.1 {
            return range.0;
        }
        self.rng.gen_range(range.0..=range.1)
    }

    pub fn sample(&mut self) -> BootstrapSample {
        let archetype = self.archetypes[self.index.sample(&mut self.rng)].clone();

        let raw = RawFeatures {
            candidate_id: None,
            technical: Some(self.sample_range(archetype.technical)),
            experience: Some(self.sample_range(archetype.experience)),
            education: Some(self.sample_range(archetype.education)),
            communication: Some(self.sample_range(archetype.communication)),
            leadership: Some(self.sample_range(archetype.leadership)),
            culture_fit: Some(self.sample_range(archetype.culture_fit)),
        };

        let accepted = self.rng.gen::<f64>() < archetype.acceptance_probability;
        let rating = if accepted {
            let (lo, hi) = archetype.rating;
            Some(self.rng.gen_range(lo..=hi.max(lo)) as f64)
        } else {
            None
        };

        BootstrapSample {
            archetype: archetype.name,
            raw,
            outcome: Outcome { accepted, rating },
        }
    }

    pub fn corpus(&mut self, size: usize) -> Vec<BootstrapSample> {
        (0..size).map(|_| self.sample()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_weights_sum_to_one() {
        let sum: f64 = default_archetypes().iter().map(|a| a.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_corpus() {
        let a = Bootstrapper::with_defaults(42).unwrap().corpus(200);
        let b = Bootstrapper::with_defaults(42).unwrap().corpus(200);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_corpus() {
        let a = Bootstrapper::with_defaults(1).unwrap().corpus(50);
        let b = Bootstrapper::with_defaults(2).unwrap().corpus(50);
        assert_ne!(a, b);
    }

    #[test]
    fn test_samples_stay_inside_archetype_ranges() {
        let archetypes: HashMap<&str, Archetype> = default_archetypes()
            .into_iter()
            .map(|a| (a.name, a))
            .collect();
        let mut bootstrapper = Bootstrapper::with_defaults(7).unwrap();

        for sample in bootstrapper.corpus(500) {
            let a = &archetypes[sample.archetype];
            let within = |v: Option<f64>, r: Range| v.map_or(false, |v| v >= r.0 && v <= r.1);
            assert!(within(sample.raw.technical, a.technical));
            assert!(within(sample.raw.experience, a.experience));
            assert!(within(sample.raw.culture_fit, a.culture_fit));
            match sample.outcome.rating {
                Some(r) => {
                    assert!(sample.outcome.accepted);
                    assert!(r >= a.rating.0 as f64 && r <= a.rating.1 as f64);
                }
                None => assert!(!sample.outcome.accepted),
            }
        }
    }

    #[test]
    fn test_mixture_roughly_follows_weights() {
        let mut bootstrapper = Bootstrapper::with_defaults(42).unwrap();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for sample in bootstrapper.corpus(5_000) {
            *counts.entry(sample.archetype).or_default() += 1;
        }
        for archetype in default_archetypes() {
            let share = counts[archetype.name] as f64 / 5_000.0;
            assert!(
                (share - archetype.weight).abs() < 0.03,
                "{} drew {share}, expected about {}",
                archetype.name,
                archetype.weight
            );
        }
    }

    #[test]
    fn test_bad_weights_are_rejected() {
        let mut archetypes = default_archetypes();
        archetypes[0].weight = 0.5;
        assert!(matches!(
            Bootstrapper::new(archetypes, 0),
            Err(ConfigValidationError::ArchetypeWeights { .. })
        ));
        assert!(Bootstrapper::new(Vec::new(), 0).is_err());
    }
}
