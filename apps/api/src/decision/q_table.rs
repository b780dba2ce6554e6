//! Q-Table Store — sparse map from `StateKey` to `ActionValue`.
//!
//! Unseen states read as the configured default and are only materialised on
//! first write, so memory tracks the states actually observed rather than the
//! full Cartesian product.

use std::collections::HashMap;

use crate::decision::models::{Action, ActionValue};
use crate::decision::quantizer::StateKey;

#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    entries: HashMap<StateKey, ActionValue>,
    default: ActionValue,
}

impl QTable {
    pub fn new(default: ActionValue) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    /// Never fails: a miss resolves to the default triple.
    pub fn get(&self, state: &StateKey) -> ActionValue {
        self.entries.get(state).copied().unwrap_or(self.default)
    }

    #[cfg(test)]
    pub fn contains(&self, state: &StateKey) -> bool {
        self.entries.contains_key(state)
    }

    /// Writes one component, creating the entry from the default if needed.
    pub fn set(&mut self, state: StateKey, action: Action, value: f64) {
        self.entries
            .entry(state)
            .or_insert(self.default)
            .set(action, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries sorted by key, so exports are stable.
    pub fn entries(&self) -> Vec<(StateKey, ActionValue)> {
        let mut out: Vec<_> = self.entries.iter().map(|(k, v)| (*k, *v)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Replaces every entry. Values are re-clamped on the way in.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = (StateKey, ActionValue)>) {
        self.entries = entries
            .into_iter()
            .map(|(k, v)| (k, ActionValue::new(v.hire, v.consider, v.reject)))
            .collect();
    }
}
