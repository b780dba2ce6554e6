//! DecisionEngine — one explicit instance per process/tenant.
//!
//! Decision path: normalize → quantize → {heuristic, Q lookup} → blend →
//! policy → safeguards. It takes the Q-table read lock only and never does I/O.
//!
//! Training path: resolve the feedback target in history, compute the reward,
//! apply the Bellman update under the Q-table write lock. HTTP callers reach it
//! through the single-writer `TrainingQueue`; direct callers are serialized by
//! the lock.
//!
//! Lock order when more than one is held: history → q_table → counters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decision::bootstrap::Bootstrapper;
use crate::decision::config::EngineConfig;
use crate::decision::errors::{ConfigValidationError, FeedbackError, PersistenceError};
use crate::decision::heuristic::{HeuristicBreakdown, HeuristicScorer};
use crate::decision::history::DecisionHistory;
use crate::decision::models::{
    clamp_unit, Action, ActionValue, BatchOutcome, Decision, DecisionDistribution,
    DecisionRecord, DecisionStage, FeatureKind, FeedbackStatus, FeedbackTarget, Insights,
    Outcome, RawFeatures, TrainingFeedback, TrainingSummary,
};
use crate::decision::normalizer::{normalize, Normalized};
use crate::decision::persistence::{EngineSnapshot, SNAPSHOT_FORMAT_VERSION};
use crate::decision::policy::{Policy, PolicyChoice};
use crate::decision::q_table::QTable;
use crate::decision::quantizer::{Quantizer, StateKey};
use crate::decision::rng::DynRng;
use crate::decision::safeguards::{SafeguardOverride, Safeguards};
use crate::decision::trainer::{scaled_reward, BellmanStep, LearningSchedule, Trainer};

/// Weight of the newest reward in the running average.
const REWARD_EMA_WEIGHT: f64 = 0.01;

const STRONG_FEATURE: f64 = 80.0;
const WEAK_FEATURE: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineCounters {
    pub total_decisions: u64,
    pub total_training: u64,
    pub ignored_feedback: u64,
    pub average_reward: f64,
    pub distribution: DecisionDistribution,
}

/// Knobs for `batch_train`.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Multiplies the scheduled learning rate; the product is capped at 1.
    pub learning_rate_boost: f64,
    pub deadline: Option<Instant>,
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            learning_rate_boost: 1.0,
            deadline: None,
            cancel: None,
        }
    }
}

impl BatchOptions {
    fn should_stop(&self) -> bool {
        let cancelled = self.cancel.as_ref().map_or(false, |rx| *rx.borrow());
        let expired = self.deadline.map_or(false, |d| Instant::now() >= d);
        cancelled || expired
    }
}

/// Everything computed for one candidate before anything is stored.
struct Evaluation {
    normalized: Normalized,
    state: StateKey,
    heuristic: HeuristicBreakdown,
    learned: ActionValue,
    blend_ratio: f64,
    choice: PolicyChoice,
    safeguard: Option<SafeguardOverride>,
    action: Action,
    confidence: f64,
}

pub struct DecisionEngine {
    config: EngineConfig,
    quantizer: Quantizer,
    scorer: HeuristicScorer,
    policy: Policy,
    safeguards: Safeguards,
    trainer: Trainer,
    schedule: LearningSchedule,
    q_table: RwLock<QTable>,
    history: Mutex<DecisionHistory>,
    counters: Mutex<EngineCounters>,
    rng: Mutex<DynRng>,
    dirty: AtomicBool,
}

impl DecisionEngine {
    /// Validates the config, builds the engine and warm-starts it from the
    /// synthetic corpus. Blocks for the duration of the bootstrap.
    pub fn init(config: EngineConfig, rng: DynRng) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        let started = Instant::now();

        let quantizer = Quantizer::new(config.binning);
        let engine = Self {
            quantizer,
            scorer: HeuristicScorer::new(&config.feature_weights, &config.penalty_multipliers),
            policy: Policy::new(config.decision_thresholds, config.blend),
            safeguards: Safeguards::new(config.safeguards),
            trainer: Trainer::new(
                config.discount_factor,
                config.improved_state_step,
                quantizer.max_bin(),
            ),
            schedule: LearningSchedule::from_config(&config),
            q_table: RwLock::new(QTable::new(config.default_action_value)),
            history: Mutex::new(DecisionHistory::new(config.max_history_size)),
            counters: Mutex::new(EngineCounters::default()),
            rng: Mutex::new(rng),
            dirty: AtomicBool::new(false),
            config,
        };

        let (table, counters) = engine.warm_start()?;
        let samples = counters.total_training;
        engine.install(table, counters);
        info!(
            "Decision engine ready: {} states in space, {} bootstrap samples, {} learned states, {:?}",
            engine.quantizer.state_space_size(),
            samples,
            engine.q_table.read().len(),
            started.elapsed()
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Trains a fresh table on the synthetic corpus without touching live
    /// state. Samples are scored greedily and never enter history.
    fn warm_start(&self) -> Result<(QTable, EngineCounters), ConfigValidationError> {
        let mut bootstrapper = Bootstrapper::with_defaults(self.config.bootstrap_seed)?;
        let corpus = bootstrapper.corpus(self.config.bootstrap_corpus_size);

        let mut table = QTable::new(self.config.default_action_value);
        let mut counters = EngineCounters::default();
        for sample in &corpus {
            let normalized = normalize(&sample.raw);
            let state = self.quantizer.quantize(&normalized.vector);
            let learned = table.get(&state);
            let eval = self.decide(normalized, state, learned, counters.total_training, 0.0);
            self.train_locked(
                &mut table,
                &mut counters,
                eval.state,
                eval.action,
                eval.confidence,
                &sample.outcome,
                1.0,
            );
        }
        debug!("Bootstrapped {} samples (seed {})", corpus.len(), self.config.bootstrap_seed);
        Ok((table, counters))
    }

    /// Swaps in warm-started state under all three locks at once.
    fn install(&self, table: QTable, counters: EngineCounters) {
        let mut history = self.history.lock();
        let mut live_table = self.q_table.write();
        let mut live_counters = self.counters.lock();
        history.clear();
        *live_table = table;
        *live_counters = counters;
    }

    // ────────────────────────────────────────────────────────────────────────
    // Decisions
    // ────────────────────────────────────────────────────────────────────────

    fn evaluate(&self, raw: &RawFeatures) -> Evaluation {
        let normalized = normalize(raw);
        let state = self.quantizer.quantize(&normalized.vector);
        let learned = self.q_table.read().get(&state);
        let training_count = self.counters.lock().total_training;
        let epsilon = self.schedule.exploration_rate(training_count);
        self.decide(normalized, state, learned, training_count, epsilon)
    }

    /// Scores one normalized candidate against the given learned values.
    fn decide(
        &self,
        normalized: Normalized,
        state: StateKey,
        learned: ActionValue,
        training_count: u64,
        epsilon: f64,
    ) -> Evaluation {
        let heuristic = self.scorer.evaluate(&normalized.vector);
        let blend_ratio = self.policy.blend_ratio(training_count);
        let scores = self.policy.blend(heuristic.score, learned, blend_ratio);
        let choice = {
            let mut rng = self.rng.lock();
            self.policy.choose(scores, epsilon, &mut **rng)
        };

        let (action, confidence, safeguard) =
            self.safeguards.apply(&normalized.vector, choice.action, choice.confidence);
        let confidence = clamp_unit(
            confidence * normalized.confidence_factor(self.config.feature_issue_penalty),
        );

        Evaluation {
            normalized,
            state,
            heuristic,
            learned,
            blend_ratio,
            choice,
            safeguard,
            action,
            confidence,
        }
    }

    /// Never fails: degraded input lowers confidence instead.
    pub fn evaluate_candidate(&self, raw: &RawFeatures) -> Decision {
        let eval = self.evaluate(raw);
        for issue in &eval.normalized.issues {
            debug!("Feature data issue: {issue}");
        }

        let decision = Decision {
            id: Uuid::new_v4(),
            candidate_id: raw.candidate_id.clone(),
            action: eval.action,
            confidence: eval.confidence,
            predicted_success_rate: eval.choice.scores.hire,
            q_value: eval.learned.get(eval.action),
            reasoning: reasoning(&eval),
            timestamp: Utc::now(),
        };

        self.history.lock().push_decision(DecisionRecord {
            decision: decision.clone(),
            features: eval.normalized.vector,
            state: eval.state,
            stage: DecisionStage::Finalized,
        });
        {
            let mut counters = self.counters.lock();
            counters.total_decisions += 1;
            counters.distribution.record(decision.action);
        }

        debug!(
            "Decision {} for state {}: {} ({:.3})",
            decision.id, eval.state, decision.action, decision.confidence
        );
        decision
    }

    #[cfg(test)]
    pub fn state_for(&self, raw: &RawFeatures) -> StateKey {
        self.quantizer.quantize(&normalize(raw).vector)
    }

    #[cfg(test)]
    pub fn q_value(&self, state: &StateKey) -> ActionValue {
        self.q_table.read().get(state)
    }

    /// Newest first.
    pub fn recent_decisions(&self, limit: usize) -> Vec<Decision> {
        self.history
            .lock()
            .recent(limit)
            .into_iter()
            .map(|r| r.decision)
            .collect()
    }

    /// Looks up a decision still held in history.
    pub fn decision(&self, id: Uuid) -> Option<Decision> {
        self.history.lock().get(id).map(|r| r.decision.clone())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Training
    // ────────────────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn train_locked(
        &self,
        table: &mut QTable,
        counters: &mut EngineCounters,
        state: StateKey,
        action: Action,
        confidence: f64,
        outcome: &Outcome,
        boost: f64,
    ) -> (f64, BellmanStep) {
        let alpha = (self.schedule.learning_rate(counters.total_training) * boost).min(1.0);
        let reward = scaled_reward(&self.config.rewards, action, outcome, confidence);
        let step = self.trainer.update(table, state, action, reward, alpha);

        counters.total_training += 1;
        counters.average_reward += REWARD_EMA_WEIGHT * (reward - counters.average_reward);
        (reward, step)
    }

    /// Trains one (state, action) pair directly, outside any stored decision.
    #[cfg(test)]
    pub fn train_state(
        &self,
        state: StateKey,
        action: Action,
        outcome: &Outcome,
        confidence: f64,
    ) -> BellmanStep {
        let (_, step) = {
            let mut table = self.q_table.write();
            let mut counters = self.counters.lock();
            self.train_locked(&mut table, &mut counters, state, action, confidence, outcome, 1.0)
        };
        self.dirty.store(true, Ordering::Release);
        step
    }

    fn apply_feedback(
        &self,
        target: &FeedbackTarget,
        outcome: &Outcome,
        boost: f64,
    ) -> Result<TrainingFeedback, FeedbackError> {
        let mut history = self.history.lock();
        let record = history
            .find_mut(target)
            .ok_or_else(|| FeedbackError::UnknownTarget(target.to_string()))?;
        if record.stage == DecisionStage::Trained {
            return Err(FeedbackError::AlreadyTrained(record.decision.id));
        }

        let (reward, step) = {
            let mut table = self.q_table.write();
            let mut counters = self.counters.lock();
            self.train_locked(
                &mut table,
                &mut counters,
                record.state,
                record.decision.action,
                record.decision.confidence,
                outcome,
                boost,
            )
        };
        record.stage = DecisionStage::Trained;

        let feedback = TrainingFeedback {
            decision_id: record.decision.id,
            candidate_id: record.decision.candidate_id.clone(),
            action: record.decision.action,
            outcome_accepted: outcome.accepted,
            performance_rating: outcome.rating,
            reward,
            q_before: step.before,
            q_after: step.after,
            trained_at: Utc::now(),
        };
        history.push_training(feedback.clone());
        self.dirty.store(true, Ordering::Release);
        Ok(feedback)
    }

    fn note_ignored(&self, err: &FeedbackError) {
        warn!("Ignoring feedback: {err}");
        self.counters.lock().ignored_feedback += 1;
    }

    /// Unknown or already-trained targets are logged, counted and ignored.
    pub fn record_outcome(&self, target: &FeedbackTarget, outcome: Outcome) -> FeedbackStatus {
        match self.apply_feedback(target, &outcome, 1.0) {
            Ok(feedback) => FeedbackStatus::Trained {
                reward: feedback.reward,
                q_value: feedback.q_after,
            },
            Err(err) => {
                self.note_ignored(&err);
                FeedbackStatus::Ignored {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Applies outcomes in order, checking for cancellation between records.
    pub fn batch_train(&self, outcomes: &[BatchOutcome], options: &BatchOptions) -> TrainingSummary {
        let boost = if options.learning_rate_boost.is_finite() && options.learning_rate_boost > 0.0 {
            options.learning_rate_boost
        } else {
            1.0
        };

        let mut trained = 0;
        let mut skipped = 0;
        let mut cancelled = false;
        for item in outcomes {
            if options.should_stop() {
                cancelled = true;
                warn!(
                    "Batch training stopped after {} of {} outcomes",
                    trained + skipped,
                    outcomes.len()
                );
                break;
            }
            match self.apply_feedback(&item.target, &item.outcome(), boost) {
                Ok(_) => trained += 1,
                Err(err) => {
                    self.note_ignored(&err);
                    skipped += 1;
                }
            }
        }

        let total_training_count = self.counters.lock().total_training;
        info!("Batch training: {trained} trained, {skipped} skipped, total {total_training_count}");
        TrainingSummary {
            trained,
            skipped,
            cancelled,
            total_training_count,
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Insights and state
    // ────────────────────────────────────────────────────────────────────────

    pub fn insights(&self) -> Insights {
        let history_size = self.history.lock().len();
        let q_table_size = self.q_table.read().len();
        let counters = self.counters.lock().clone();
        let n = counters.total_training;

        Insights {
            total_decisions: counters.total_decisions,
            q_table_size,
            state_space_size: self.quantizer.state_space_size(),
            exploration_rate: self.schedule.exploration_rate(n),
            learning_rate: self.schedule.learning_rate(n),
            blend_ratio: self.policy.blend_ratio(n),
            total_training_count: n,
            average_reward: counters.average_reward,
            ignored_feedback: counters.ignored_feedback,
            history_size,
            decision_distribution: counters.distribution,
        }
    }

    pub fn export_state(&self) -> EngineSnapshot {
        let history = self.history.lock();
        let table = self.q_table.read();
        let counters = self.counters.lock();

        EngineSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            config_version: self.config.version.clone(),
            exported_at: Utc::now(),
            q_table: table.entries(),
            decision_history: history.decisions().cloned().collect(),
            training_history: history.training().cloned().collect(),
            counters: counters.clone(),
        }
    }

    /// Replaces all in-memory state with the snapshot.
    pub fn import_state(&self, snapshot: EngineSnapshot) -> Result<(), PersistenceError> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: snapshot.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        if snapshot.config_version != self.config.version {
            warn!(
                "Importing snapshot written under config version {} into config version {}",
                snapshot.config_version, self.config.version
            );
        }

        let entries = snapshot.q_table.len();
        {
            let mut history = self.history.lock();
            let mut table = self.q_table.write();
            let mut counters = self.counters.lock();
            history.restore(snapshot.decision_history, snapshot.training_history);
            table.replace_all(snapshot.q_table);
            *counters = snapshot.counters;
        }
        self.dirty.store(true, Ordering::Release);
        info!("Imported engine state with {entries} Q-table entries");
        Ok(())
    }

    /// Discards learned state and history and re-runs the bootstrap. The new
    /// table is built off to the side; traffic keeps seeing the old state until
    /// the swap, and feedback applied meanwhile is discarded with it.
    pub fn reset(&self) -> Result<usize, ConfigValidationError> {
        let (table, counters) = self.warm_start()?;
        let samples = self.config.bootstrap_corpus_size;
        self.install(table, counters);
        self.dirty.store(true, Ordering::Release);
        info!("Decision engine reset; re-bootstrapped with {samples} samples");
        Ok(samples)
    }

    /// Returns whether state changed since the last call, clearing the flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

fn reasoning(eval: &Evaluation) -> Vec<String> {
    let mut reasons = Vec::new();
    let vector = &eval.normalized.vector;

    for kind in FeatureKind::ALL {
        let value = vector.get(kind);
        if value >= STRONG_FEATURE {
            reasons.push(format!("Strong {kind} ({value:.0})"));
        } else if value <= WEAK_FEATURE {
            reasons.push(format!("Weak {kind} ({value:.0})"));
        }
    }
    for rule in &eval.heuristic.triggered {
        reasons.push(format!(
            "{} below {:.0} applies a x{} penalty",
            rule.feature, rule.floor, rule.multiplier
        ));
    }
    reasons.push(format!(
        "Heuristic score {:.3}; learned values weighted at {:.1}%",
        eval.heuristic.score,
        eval.blend_ratio * 100.0
    ));

    if eval.choice.explored {
        reasons.push(format!("Exploratory pick: {}", eval.choice.proposed));
    }
    if eval.choice.was_banded() {
        reasons.push(format!(
            "{} score {:.3} missed its threshold; placed in the consider band",
            eval.choice.proposed,
            eval.choice.scores.get(eval.choice.proposed)
        ));
    }
    if let Some(applied) = &eval.safeguard {
        reasons.push(format!(
            "Safeguard {}: {} ({} -> {})",
            applied.rule.as_str(),
            applied.rule.describe(),
            applied.from,
            applied.to
        ));
    }
    for issue in &eval.normalized.issues {
        reasons.push(format!("Input issue: {issue}"));
    }
    reasons
}
