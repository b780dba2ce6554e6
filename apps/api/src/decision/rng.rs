//! Random sources injected into the engine.
//!
//! The engine only ever sees `Box<dyn RngCore + Send>`; tests and deterministic
//! deployments pass a seeded generator, production passes an entropy-seeded one.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub type DynRng = Box<dyn RngCore + Send>;

/// Reproducible stream for a given seed.
pub fn seeded(seed: u64) -> DynRng {
    Box::new(ChaCha8Rng::seed_from_u64(seed))
}

pub fn from_entropy() -> DynRng {
    Box::new(StdRng::from_entropy())
}
