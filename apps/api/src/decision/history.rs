//! Bounded decision and training history.
//!
//! Both buffers evict their oldest entry once `capacity` is reached. Feedback
//! lookups go through here: by decision id, or by candidate id which resolves
//! to that candidate's most recent decision.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::decision::models::{DecisionRecord, FeedbackTarget, TrainingFeedback};

#[derive(Debug, Clone)]
pub struct DecisionHistory {
    capacity: usize,
    decisions: VecDeque<DecisionRecord>,
    training: VecDeque<TrainingFeedback>,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            decisions: VecDeque::new(),
            training: VecDeque::new(),
        }
    }

    pub fn push_decision(&mut self, record: DecisionRecord) {
        push_bounded(&mut self.decisions, record, self.capacity);
    }

    pub fn push_training(&mut self, feedback: TrainingFeedback) {
        push_bounded(&mut self.training, feedback, self.capacity);
    }

    fn position(&self, target: &FeedbackTarget) -> Option<usize> {
        match target {
            FeedbackTarget::DecisionId(id) => self.decisions.iter().position(|r| r.decision.id == *id),
            FeedbackTarget::CandidateId(candidate) => self
                .decisions
                .iter()
                .rposition(|r| r.decision.candidate_id.as_deref() == Some(candidate.as_str())),
        }
    }

    pub fn find(&self, target: &FeedbackTarget) -> Option<&DecisionRecord> {
        self.position(target).map(|i| &self.decisions[i])
    }

    pub fn find_mut(&mut self, target: &FeedbackTarget) -> Option<&mut DecisionRecord> {
        let index = self.position(target)?;
        self.decisions.get_mut(index)
    }

    pub fn get(&self, id: Uuid) -> Option<&DecisionRecord> {
        self.find(&FeedbackTarget::DecisionId(id))
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<DecisionRecord> {
        self.decisions.iter().rev().take(limit).cloned().collect()
    }

    pub fn decisions(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.decisions.iter()
    }

    pub fn training(&self) -> impl Iterator<Item = &TrainingFeedback> {
        self.training.iter()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn clear(&mut self) {
        self.decisions.clear();
        self.training.clear();
    }

    /// Replaces both buffers, keeping only the newest `capacity` entries of each.
    pub fn restore(&mut self, decisions: Vec<DecisionRecord>, training: Vec<TrainingFeedback>) {
        self.clear();
        for record in decisions {
            self.push_decision(record);
        }
        for feedback in training {
            self.push_training(feedback);
        }
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::models::{Action, Decision, DecisionStage, FeatureVector};
    use crate::decision::quantizer::StateKey;
    use chrono::Utc;

    fn record(candidate: Option<&str>) -> DecisionRecord {
        DecisionRecord {
            decision: Decision {
                id: Uuid::new_v4(),
                candidate_id: candidate.map(str::to_string),
                action: Action::Consider,
                confidence: 0.5,
                predicted_success_rate: 0.5,
                q_value: 0.5,
                reasoning: Vec::new(),
                timestamp: Utc::now(),
            },
            features: FeatureVector::from_values([50.0; 6]),
            state: StateKey::new([5; 6]),
            stage: DecisionStage::Finalized,
        }
    }

    #[test]
    fn test_oldest_entry_is_evicted_at_capacity() {
        let mut history = DecisionHistory::new(3);
        let first = record(None);
        let first_id = first.decision.id;
        history.push_decision(first);
        for _ in 0..3 {
            history.push_decision(record(None));
        }
        assert_eq!(history.len(), 3);
        assert!(history.get(first_id).is_none());
    }

    #[test]
    fn test_candidate_target_resolves_to_latest() {
        let mut history = DecisionHistory::new(10);
        let older = record(Some("c-1"));
        let newer = record(Some("c-1"));
        let newer_id = newer.decision.id;
        history.push_decision(older);
        history.push_decision(record(Some("c-2")));
        history.push_decision(newer);

        let found = history.find(&FeedbackTarget::CandidateId("c-1".to_string())).unwrap();
        assert_eq!(found.decision.id, newer_id);
        assert!(history.find(&FeedbackTarget::CandidateId("c-404".to_string())).is_none());
    }

    #[test]
    fn test_find_mut_updates_stage_in_place() {
        let mut history = DecisionHistory::new(10);
        let r = record(None);
        let id = r.decision.id;
        history.push_decision(r);

        history.find_mut(&FeedbackTarget::DecisionId(id)).unwrap().stage = DecisionStage::Trained;
        assert_eq!(history.get(id).unwrap().stage, DecisionStage::Trained);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut history = DecisionHistory::new(10);
        let ids: Vec<Uuid> = (0..4)
            .map(|_| {
                let r = record(None);
                let id = r.decision.id;
                history.push_decision(r);
                id
            })
            .collect();
        let recent: Vec<Uuid> = history.recent(2).iter().map(|r| r.decision.id).collect();
        assert_eq!(recent, vec![ids[3], ids[2]]);
    }

    #[test]
    fn test_restore_truncates_to_capacity() {
        let mut history = DecisionHistory::new(2);
        let records: Vec<DecisionRecord> = (0..5).map(|_| record(None)).collect();
        let last_id = records[4].decision.id;
        history.restore(records, Vec::new());
        assert_eq!(history.len(), 2);
        assert!(history.get(last_id).is_some());
    }
}
