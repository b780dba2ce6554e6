//! State Quantizer — discretizes a canonical feature vector into a `StateKey`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decision::config::StateBinning;
use crate::decision::models::{FeatureVector, FEATURE_COUNT};

/// One bin per feature, in `FeatureKind::ALL` order. Rendered as `8-9-8-7-6-8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateKey([u8; FEATURE_COUNT]);

impl StateKey {
    pub fn new(bins: [u8; FEATURE_COUNT]) -> Self {
        Self(bins)
    }

    #[cfg(test)]
    pub fn bins(&self) -> [u8; FEATURE_COUNT] {
        self.0
    }

    /// Every bin raised by `step`, capped at `max_bin`.
    pub fn improved(&self, step: u8, max_bin: u8) -> Self {
        let mut bins = self.0;
        for bin in bins.iter_mut() {
            *bin = bin.saturating_add(step).min(max_bin);
        }
        Self(bins)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{bin}")?;
        }
        Ok(())
    }
}

impl FromStr for StateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != FEATURE_COUNT {
            return Err(format!(
                "state key '{s}' must have {FEATURE_COUNT} bins, found {}",
                parts.len()
            ));
        }
        let mut bins = [0u8; FEATURE_COUNT];
        for (slot, part) in bins.iter_mut().zip(parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("state key '{s}' has a non-numeric bin '{part}'"))?;
        }
        Ok(Self(bins))
    }
}

impl TryFrom<String> for StateKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StateKey> for String {
    fn from(key: StateKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    bin_width: f64,
    max_bin: u8,
}

impl Quantizer {
    pub fn new(binning: StateBinning) -> Self {
        Self {
            bin_width: binning.bin_width,
            max_bin: binning.max_bin,
        }
    }

    pub fn max_bin(&self) -> u8 {
        self.max_bin
    }

    /// `bin_i = clamp(floor(value_i / binWidth), 0, maxBin)`.
    pub fn quantize(&self, vector: &FeatureVector) -> StateKey {
        let mut bins = [0u8; FEATURE_COUNT];
        for (slot, value) in bins.iter_mut().zip(vector.values()) {
            let bin = (value / self.bin_width).floor();
            *slot = if bin.is_nan() || bin <= 0.0 {
                0
            } else {
                bin.min(self.max_bin as f64) as u8
            };
        }
        StateKey(bins)
    }

    /// Cardinality of the full state space. Reported only; never materialised.
    pub fn state_space_size(&self) -> u64 {
        (self.max_bin as u64 + 1).pow(FEATURE_COUNT as u32)
    }
}
