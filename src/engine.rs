//! The synchronous engine core: ingests keystroke events, maintains per-key
//! and per-n-gram state, and serves weakness reports, dashboard aggregates
//! and live risk estimates. The async shell around it lives in
//! [`crate::service`].

use chrono::Timelike;
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};

use crate::config::EngineConfig;
use crate::ensemble::EnsemblePredictor;
use crate::hmm::{self, SkillObservation};
use crate::ngram::NgramAnalyzer;
use crate::persistence::{EngineSnapshot, KeyEntry, NgramEntry, SNAPSHOT_VERSION};
use crate::risk::{RiskContext, RiskPredictor};
use crate::scheduler::{PracticeScheduler, PriorityInput};
use crate::stats::Sampler;
use crate::trend::TrendAnalyzer;
use crate::types::{
    DashboardSummary, Finger, KeySummary, KeyState, KeystrokeEvent, SkillState, WeaknessReport,
};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Window used for error momentum and the recent-accuracy ease signal.
const RECENT_WINDOW: usize = 10;
const EASE_WINDOW: usize = 20;
const RECENT_KEYS: usize = 5;
const CORRELATED_LIMIT: usize = 3;

/// A key is flagged weak once enough evidence puts its accuracy under this.
const WEAK_ACCURACY_THRESHOLD: f64 = 0.8;
const WEAK_MIN_OBSERVATIONS: f64 = 5.0;

/// Session context supplied by the caller for live risk prediction.
#[derive(Debug, Clone, Copy)]
pub struct LiveContext {
    pub upcoming: char,
    pub wpm: f64,
    pub accuracy: f64,
    pub session_minutes: f64,
    /// Defaults to the current wall clock when absent.
    pub timestamp_ms: Option<i64>,
}

pub struct WeaknessEngine {
    config: EngineConfig,
    keys: HashMap<char, KeyState>,
    ngrams: NgramAnalyzer,
    sampler: Sampler,
    ensemble: EnsemblePredictor,
    scheduler: PracticeScheduler,
    trend: TrendAnalyzer,
    risk: RiskPredictor,

    session_index: u32,
    session_keystrokes: u32,
    total_keystrokes: u64,
    finger_counts: HashMap<Finger, u64>,
    recent_outcomes: VecDeque<bool>,
    recent_keys: VecDeque<char>,
    last_timestamp_ms: Option<i64>,
}

impl WeaknessEngine {
    pub fn new(config: EngineConfig) -> Self {
        let sampler = match config.seed {
            Some(seed) => Sampler::from_seed(seed),
            None => Sampler::from_entropy(),
        };
        Self {
            ngrams: NgramAnalyzer::new(config.ngram.clone()),
            ensemble: EnsemblePredictor::new(config.ensemble.clone()),
            scheduler: PracticeScheduler::new(config.scheduler.clone()),
            trend: TrendAnalyzer::new(config.trend.clone()),
            risk: RiskPredictor::new(config.risk.clone()),
            sampler,
            keys: HashMap::new(),
            session_index: 0,
            session_keystrokes: 0,
            total_keystrokes: 0,
            finger_counts: HashMap::new(),
            recent_outcomes: VecDeque::with_capacity(RECENT_WINDOW),
            recent_keys: VecDeque::with_capacity(RECENT_KEYS),
            last_timestamp_ms: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracked_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn total_keystrokes(&self) -> u64 {
        self.total_keystrokes
    }

    pub fn session_index(&self) -> u32 {
        self.session_index
    }

    /// Ingest one keystroke. Sparse events fall back to defaults; nothing
    /// here returns an error.
    pub fn record_keystroke(&mut self, event: &KeystrokeEvent) {
        let key = event.key.to_ascii_lowercase();
        let ts = event.timestamp_ms;
        let correct = event.is_correct;

        let latency_ms = self.resolve_latency(event);
        let position_bin = (self.session_keystrokes / self.config.session_bin_size.max(1)) as usize;
        let previous = event
            .previous_key
            .map(|k| k.to_ascii_lowercase())
            .or_else(|| self.recent_keys.back().copied());

        if let Some(finger) = event.finger {
            *self.finger_counts.entry(finger).or_insert(0) += 1;
        }
        self.total_keystrokes += 1;
        self.session_keystrokes += 1;

        let state = self
            .keys
            .entry(key)
            .or_insert_with(|| KeyState::new(&self.config, ts));

        state.accuracy.observe(correct);
        state.attempts.add(if correct { 1.0 } else { 0.0 }, ts);
        if correct {
            state.successes.add(1.0, ts);
        }
        if let Some(latency) = latency_ms {
            state.speed.observe(latency);
            state.speeds.add(latency, ts);
        }

        if let Some(hour) = hour_of_day(ts) {
            state.observe_hour(hour, correct);
        }
        state.observe_position(position_bin, correct);
        if let Some(prev) = previous {
            *state.adjacent_keys.entry(prev).or_insert(0) += 1;
        }
        if let Some(finger) = event.finger {
            state.finger = Some(finger);
            let finger_total = self.finger_counts.get(&finger).copied().unwrap_or(0);
            state.finger_load = finger_total as f64 / self.total_keystrokes as f64;
        }

        state.consecutive_correct = if correct {
            state.consecutive_correct + 1
        } else {
            0
        };
        state.session_attempts += 1;
        if correct {
            state.session_correct += 1;
        }

        let recent_accuracy = state.recent_accuracy(EASE_WINDOW);
        state.ease_factor = self.scheduler.adjust_ease(state.ease_factor, recent_accuracy);
        state.optimal_practice_interval_days = self
            .scheduler
            .optimal_interval_days(state.ease_factor, state.consecutive_correct);
        state.last_practiced_ms = ts;

        let avg_speed = state
            .speeds
            .mean()
            .unwrap_or(self.config.inference.baseline_latency_ms);
        let observation = SkillObservation {
            was_correct: correct,
            speed_ms: latency_ms.unwrap_or(avg_speed),
            avg_speed_ms: avg_speed,
        };
        let transition = hmm::step(state.skill_state, &observation, &mut self.sampler);
        state.skill_state = transition.next;
        state.state_probabilities = transition.probabilities;

        self.ngrams.observe(key, ts, correct);

        self.recent_outcomes.push_back(correct);
        if self.recent_outcomes.len() > RECENT_WINDOW {
            self.recent_outcomes.pop_front();
        }
        self.recent_keys.push_back(key);
        if self.recent_keys.len() > RECENT_KEYS {
            self.recent_keys.pop_front();
        }
        self.last_timestamp_ms = Some(ts);
    }

    fn resolve_latency(&self, event: &KeystrokeEvent) -> Option<f64> {
        let max_span = self.config.ngram.max_span_ms;
        if let Some(hesitation) = event.hesitation_ms {
            if hesitation > 0 && hesitation <= max_span {
                return Some(hesitation as f64);
            }
        }
        let last = self.last_timestamp_ms?;
        let delta = event.timestamp_ms - last;
        if delta > 0 && delta <= max_span {
            Some(delta as f64)
        } else {
            None
        }
    }

    /// Full weakness report for one key. A key with no observations yields
    /// a neutral-prior report rather than an error.
    pub fn analyze(&mut self, key: char) -> WeaknessReport {
        let key = key.to_ascii_lowercase();
        let now_ms = chrono::Utc::now().timestamp_millis();

        if !self.keys.contains_key(&key) {
            return self.neutral_report(key, now_ms);
        }

        // Temporal signal first: borrow of the ngram table is independent of
        // the key map entry we mutate below.
        let temporal_error = self.ngrams.bigram_error_rate(key);

        // Presence checked above; the entry API keeps this panic-free.
        let state = self
            .keys
            .entry(key)
            .or_insert_with(|| KeyState::new(&self.config, now_ms));

        let accuracy_mean = state.accuracy.mean();
        let accuracy_interval = state
            .accuracy
            .credible_interval(self.config.inference.credible_level);
        let confidence = state.accuracy.confidence();

        let expected_latency = state.speed.expected_latency_ms();
        let latency_interval = (
            state.speeds.percentile(0.025).unwrap_or(expected_latency),
            state.speeds.percentile(0.975).unwrap_or(expected_latency),
        );

        let signal = self.trend.assess(&state.learning_curve);
        state.plateau_detected = signal.plateau;
        let learning_rate = (signal.slope / (1.0 - accuracy_mean).max(0.05)).max(0.0);

        let hmm_competence = EnsemblePredictor::state_competence(&state.state_probabilities);
        let temporal = temporal_error
            .map(|rate| 1.0 - rate)
            .unwrap_or(accuracy_mean);
        let components = self.ensemble.blend(accuracy_mean, hmm_competence, temporal);
        let weakness_score = 1.0 - components.blended;

        let days_since = ((now_ms - state.last_practiced_ms) as f64 / MS_PER_DAY).max(0.0);
        let practice_priority = self.scheduler.priority(&PriorityInput {
            accuracy_estimate: components.blended,
            skill_state: state.skill_state,
            recent_trend: signal.slope,
            confidence,
            days_since_practice: days_since,
        });

        let next_practice_ms = self
            .scheduler
            .next_review_ms(now_ms, state.optimal_practice_interval_days);

        let sessions_to_mastery = self.scheduler.sessions_to_mastery(
            accuracy_mean,
            learning_rate,
            self.scheduler.mastery_threshold(),
        );

        let predicted_plateau_ms = if signal.plateau {
            Some(now_ms)
        } else if sessions_to_mastery.is_finite() && sessions_to_mastery > 0.0 {
            let days = sessions_to_mastery * state.optimal_practice_interval_days;
            Some(now_ms + (days * MS_PER_DAY) as i64)
        } else {
            None
        };

        state.confounding_factors = confounding_factors(state);
        let recommended_interventions =
            recommended_interventions(state, weakness_score, expected_latency, &self.config);

        let posterior = state.accuracy;
        let skill_state = state.skill_state;
        let state_probabilities = state.state_probabilities;
        let best_practice_hour = state.best_practice_hour();
        let optimal_session_position = state.optimal_session_position();
        let correlated_keys = state.correlated_keys(CORRELATED_LIMIT);

        WeaknessReport {
            key,
            accuracy_estimate: accuracy_mean,
            accuracy_interval,
            expected_latency_ms: expected_latency,
            latency_interval_ms: latency_interval,
            skill_state,
            state_probabilities,
            weakness_score,
            confidence,
            practice_priority,
            next_practice_ms,
            sessions_to_mastery,
            best_practice_hour,
            optimal_session_position,
            correlated_keys,
            recommended_interventions,
            components,
            learning_rate,
            predicted_plateau_ms,
            exploration_score: self.sampler.thompson(&posterior),
        }
    }

    fn neutral_report(&mut self, key: char, now_ms: i64) -> WeaknessReport {
        let posterior = crate::stats::BetaPosterior::uninformative();
        let mean = posterior.mean();
        let components = self.ensemble.blend(mean, 0.0, mean);
        WeaknessReport {
            key,
            accuracy_estimate: mean,
            accuracy_interval: posterior.credible_interval(self.config.inference.credible_level),
            expected_latency_ms: self.config.inference.baseline_latency_ms,
            latency_interval_ms: (
                self.config.inference.baseline_latency_ms,
                self.config.inference.baseline_latency_ms,
            ),
            skill_state: SkillState::Learning,
            state_probabilities: [1.0, 0.0, 0.0, 0.0],
            weakness_score: 1.0 - components.blended,
            confidence: 0.0,
            practice_priority: self.scheduler.priority(&PriorityInput {
                accuracy_estimate: components.blended,
                skill_state: SkillState::Learning,
                recent_trend: 0.0,
                confidence: 0.0,
                days_since_practice: 0.0,
            }),
            next_practice_ms: self
                .scheduler
                .next_review_ms(now_ms, self.config.scheduler.base_interval_days),
            sessions_to_mastery: f64::INFINITY,
            best_practice_hour: None,
            optimal_session_position: None,
            correlated_keys: Vec::new(),
            recommended_interventions: Vec::new(),
            components,
            learning_rate: 0.0,
            predicted_plateau_ms: None,
            exploration_score: self.sampler.thompson(&posterior),
        }
    }

    /// Record the observed accuracy delta of a named practice intervention
    /// for a key; recommendations rank by the smoothed effect.
    pub fn record_intervention_outcome(&mut self, key: char, name: &str, accuracy_delta: f64) {
        let key = key.to_ascii_lowercase();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let state = self
            .keys
            .entry(key)
            .or_insert_with(|| KeyState::new(&self.config, now_ms));
        let effect = state
            .intervention_effects
            .entry(name.to_string())
            .or_insert(0.0);
        *effect = 0.7 * *effect + 0.3 * accuracy_delta;
    }

    /// Aggregate read model for UI summaries; per-key work fans out across
    /// the thread pool. Sampling-free, so repeated calls agree.
    pub fn dashboard(&self) -> DashboardSummary {
        let now_ms = chrono::Utc::now().timestamp_millis();

        let mut weakest_keys: Vec<KeySummary> = self
            .keys
            .par_iter()
            .map(|(&key, state)| {
                let signal = self.trend.assess(&state.learning_curve);
                let days_since =
                    ((now_ms - state.last_practiced_ms) as f64 / MS_PER_DAY).max(0.0);
                let priority = self.scheduler.priority(&PriorityInput {
                    accuracy_estimate: state.accuracy.mean(),
                    skill_state: state.skill_state,
                    recent_trend: signal.slope,
                    confidence: state.accuracy.confidence(),
                    days_since_practice: days_since,
                });
                KeySummary {
                    key,
                    accuracy: state.accuracy.mean(),
                    expected_latency_ms: state.speed.expected_latency_ms(),
                    skill_state: state.skill_state,
                    practice_priority: priority,
                    attempts: state.accuracy.effective_sample_size(),
                }
            })
            .collect();
        weakest_keys.sort_by(|a, b| {
            b.practice_priority
                .partial_cmp(&a.practice_priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let observed: f64 = self
            .keys
            .values()
            .map(|s| s.accuracy.effective_sample_size())
            .sum();
        let overall_accuracy = if observed > 0.0 {
            let correct: f64 = self
                .keys
                .values()
                .map(|s| s.accuracy.alpha - s.accuracy.prior_alpha)
                .sum();
            correct / observed
        } else {
            1.0
        };

        DashboardSummary {
            total_keystrokes: self.total_keystrokes,
            session_index: self.session_index,
            overall_accuracy,
            weakest_keys,
            slowest_ngrams: self.ngrams.slowest(self.config.ngram.report_limit),
            error_prone_ngrams: self.ngrams.error_prone(self.config.ngram.report_limit),
        }
    }

    /// Instantaneous error probability for the next keystroke. Pure
    /// arithmetic over already-maintained state; safe inside the keystroke
    /// handler.
    pub fn predict_risk(&self, ctx: &LiveContext) -> f64 {
        let upcoming = ctx.upcoming.to_ascii_lowercase();
        let ts = ctx
            .timestamp_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let hour = hour_of_day(ts).unwrap_or(12);

        let (key_error, key_is_weak) = match self.keys.get(&upcoming) {
            Some(state) => {
                let mean = state.accuracy.mean();
                let weak = mean < WEAK_ACCURACY_THRESHOLD
                    && state.accuracy.effective_sample_size() >= WEAK_MIN_OBSERVATIONS;
                (1.0 - mean, weak)
            }
            None => (0.5, false),
        };

        let bigram_error_rate = self
            .recent_keys
            .back()
            .and_then(|&prev| {
                let bigram: String = [prev, upcoming].iter().collect();
                self.ngrams.get(&bigram).map(|s| s.error_rate)
            })
            .or_else(|| self.ngrams.bigram_error_rate(upcoming))
            .unwrap_or(0.0);

        let recent_errors = self.recent_outcomes.iter().filter(|&&ok| !ok).count() as u32;

        self.risk.predict(&RiskContext {
            key_error_estimate: key_error,
            key_is_weak,
            bigram_error_rate,
            recent_errors,
            session_accuracy: ctx.accuracy,
            wpm: ctx.wpm,
            session_minutes: ctx.session_minutes,
            hour_of_day: hour,
        })
    }

    /// Close the current session: fold per-key session accuracy into the
    /// learning curves, refresh plateau flags and clear the rolling n-gram
    /// buffer so the next exercise starts clean.
    pub fn end_session(&mut self) {
        for state in self.keys.values_mut() {
            state.end_session();
            state.plateau_detected = self.trend.assess(&state.learning_curve).plateau;
        }
        self.session_index += 1;
        self.session_keystrokes = 0;
        self.recent_outcomes.clear();
        self.recent_keys.clear();
        self.last_timestamp_ms = None;
        self.ngrams.reset_sequence();
    }

    /// Forget the rolling n-gram sequence without ending the session; call
    /// between exercises inside one sitting.
    pub fn reset_sequence(&mut self) {
        self.ngrams.reset_sequence();
    }

    /// Atomic full wipe of every tracked entity.
    pub fn reset(&mut self) {
        self.keys = HashMap::new();
        self.ngrams = NgramAnalyzer::new(self.config.ngram.clone());
        self.finger_counts = HashMap::new();
        self.recent_outcomes = VecDeque::with_capacity(RECENT_WINDOW);
        self.recent_keys = VecDeque::with_capacity(RECENT_KEYS);
        self.session_index = 0;
        self.session_keystrokes = 0;
        self.total_keystrokes = 0;
        self.last_timestamp_ms = None;
        tracing::debug!("engine state wiped");
    }

    pub fn to_snapshot(&self) -> EngineSnapshot {
        let mut keys: Vec<KeyEntry> = self
            .keys
            .iter()
            .map(|(&key, state)| KeyEntry {
                key,
                state: state.clone(),
            })
            .collect();
        keys.sort_by_key(|e| e.key);

        EngineSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            session_index: self.session_index,
            total_keystrokes: self.total_keystrokes,
            keys,
            ngrams: self
                .ngrams
                .to_entries()
                .into_iter()
                .map(|(ngram, stat)| NgramEntry { ngram, stat })
                .collect(),
        }
    }

    pub fn from_snapshot(config: EngineConfig, snapshot: EngineSnapshot) -> Self {
        let mut engine = Self::new(config);
        engine.session_index = snapshot.session_index;
        engine.total_keystrokes = snapshot.total_keystrokes;
        engine.keys = snapshot
            .keys
            .into_iter()
            .map(|entry| (entry.key, entry.state))
            .collect();
        engine.ngrams = NgramAnalyzer::from_entries(
            engine.config.ngram.clone(),
            snapshot
                .ngrams
                .into_iter()
                .map(|entry| (entry.ngram, entry.stat))
                .collect(),
        );
        engine
    }

    pub fn serialize(&self) -> Result<String, crate::error::EngineError> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    pub fn deserialize(
        config: EngineConfig,
        blob: &str,
    ) -> Result<Self, crate::error::EngineError> {
        let snapshot: EngineSnapshot = serde_json::from_str(blob)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(crate::error::EngineError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION.to_string(),
            });
        }
        Ok(Self::from_snapshot(config, snapshot))
    }
}

impl Default for WeaknessEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn hour_of_day(timestamp_ms: i64) -> Option<u32> {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.hour())
}

/// Context skews worth flagging next to a key's report.
fn confounding_factors(state: &KeyState) -> Vec<String> {
    let mut factors = Vec::new();

    let total_attempts: u32 = state.hour_attempts.iter().sum();
    if total_attempts >= 10 {
        let late_attempts: u32 = state
            .hour_attempts
            .iter()
            .enumerate()
            .filter(|(h, _)| *h < 6 || *h >= 23)
            .map(|(_, &n)| n)
            .sum();
        let late_errors: u32 = state
            .hour_attempts
            .iter()
            .zip(state.hour_correct.iter())
            .enumerate()
            .filter(|(h, _)| *h < 6 || *h >= 23)
            .map(|(_, (&n, &c))| n - c)
            .sum();
        let total_errors: u32 = state
            .hour_attempts
            .iter()
            .zip(state.hour_correct.iter())
            .map(|(&n, &c)| n - c)
            .sum();
        if total_errors > 0 && late_attempts > 0 && late_errors * 2 > total_errors {
            factors.push("lateNightSessions".to_string());
        }
    }

    let bins = state.position_attempts.len();
    if bins >= 4 {
        let half = bins / 2;
        let early: (u32, u32) = (
            state.position_attempts[..half].iter().sum(),
            state.position_correct[..half].iter().sum(),
        );
        let late: (u32, u32) = (
            state.position_attempts[half..].iter().sum(),
            state.position_correct[half..].iter().sum(),
        );
        if early.0 >= 10 && late.0 >= 10 {
            let early_acc = early.1 as f64 / early.0 as f64;
            let late_acc = late.1 as f64 / late.0 as f64;
            if early_acc - late_acc > 0.15 {
                factors.push("sessionFatigue".to_string());
            }
        }
    }

    factors
}

fn recommended_interventions(
    state: &KeyState,
    weakness_score: f64,
    expected_latency_ms: f64,
    config: &EngineConfig,
) -> Vec<String> {
    // Measured effects first, strongest improvement at the front.
    let mut measured: Vec<(&String, f64)> = state
        .intervention_effects
        .iter()
        .filter(|(_, &delta)| delta > 0.0)
        .map(|(name, &delta)| (name, delta))
        .collect();
    measured.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut recommendations: Vec<String> =
        measured.into_iter().map(|(name, _)| name.clone()).collect();

    // Heuristic fallbacks for keys without measured interventions yet.
    let suggest = |recs: &mut Vec<String>, name: &str| {
        if !recs.iter().any(|r| r == name) {
            recs.push(name.to_string());
        }
    };
    if state.skill_state == SkillState::Regressing {
        suggest(&mut recommendations, "slowPractice");
    }
    if weakness_score > 0.5 {
        suggest(&mut recommendations, "targetedDrill");
    }
    if expected_latency_ms > 1.5 * config.inference.baseline_latency_ms {
        suggest(&mut recommendations, "speedBurst");
    }
    if state.plateau_detected {
        suggest(&mut recommendations, "varietyMix");
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_engine() -> WeaknessEngine {
        let config = EngineConfig {
            seed: Some(42),
            ..EngineConfig::default()
        };
        WeaknessEngine::new(config)
    }

    fn event(key: char, ts: i64, correct: bool) -> KeystrokeEvent {
        KeystrokeEvent {
            key,
            expected: Some(key),
            timestamp_ms: ts,
            is_correct: correct,
            hesitation_ms: Some(250),
            finger: Some(Finger::LeftIndex),
            previous_key: None,
        }
    }

    #[test]
    fn test_key_state_created_lazily() {
        let mut engine = seeded_engine();
        assert_eq!(engine.tracked_keys(), 0);
        engine.record_keystroke(&event('f', 1_000, true));
        assert_eq!(engine.tracked_keys(), 1);
        engine.record_keystroke(&event('F', 2_000, true));
        assert_eq!(engine.tracked_keys(), 1, "case folds to one key");
    }

    #[test]
    fn test_posterior_moves_with_outcomes() {
        let mut engine = seeded_engine();
        for i in 0..10 {
            engine.record_keystroke(&event('j', 1_000 * i, i % 5 != 0));
        }
        let report = engine.analyze('j');
        // 8 successes, 2 failures over a uniform prior.
        assert!((report.accuracy_estimate - 9.0 / 12.0).abs() < 1e-12);
        assert!(report.accuracy_interval.lower <= report.accuracy_estimate);
        assert!(report.accuracy_estimate <= report.accuracy_interval.upper);
    }

    #[test]
    fn test_unknown_key_gets_neutral_prior() {
        let mut engine = seeded_engine();
        let report = engine.analyze('q');
        assert!((report.accuracy_estimate - 0.5).abs() < 1e-12);
        assert_eq!(report.confidence, 0.0);
        assert_eq!(report.skill_state, SkillState::Learning);
        assert!(report.sessions_to_mastery.is_infinite());
    }

    #[test]
    fn test_malformed_event_uses_defaults() {
        let mut engine = seeded_engine();
        let sparse = KeystrokeEvent {
            key: 'k',
            ..KeystrokeEvent::default()
        };
        engine.record_keystroke(&sparse);
        assert_eq!(engine.tracked_keys(), 1);
        assert_eq!(engine.total_keystrokes(), 1);
    }

    #[test]
    fn test_state_probabilities_normalized_after_updates() {
        let mut engine = seeded_engine();
        for i in 0..50 {
            engine.record_keystroke(&event('d', 500 * i, i % 7 != 0));
        }
        let report = engine.analyze('d');
        let sum: f64 = report.state_probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weak_key_outranks_strong_key() {
        let mut engine = seeded_engine();
        let mut ts = 0;
        for i in 0..40 {
            engine.record_keystroke(&event('a', ts, true));
            ts += 300;
            engine.record_keystroke(&event('z', ts, i % 2 == 0));
            ts += 300;
        }
        let strong = engine.analyze('a');
        let weak = engine.analyze('z');
        assert!(weak.weakness_score > strong.weakness_score);
        assert!(weak.practice_priority > strong.practice_priority);

        let dashboard = engine.dashboard();
        assert_eq!(dashboard.weakest_keys[0].key, 'z');
    }

    #[test]
    fn test_dashboard_overall_accuracy() {
        let mut engine = seeded_engine();
        for i in 0..10 {
            engine.record_keystroke(&event('g', 300 * i, i < 8));
        }
        let dashboard = engine.dashboard();
        assert!((dashboard.overall_accuracy - 0.8).abs() < 1e-12);
        assert_eq!(dashboard.total_keystrokes, 10);
    }

    #[test]
    fn test_risk_rises_with_recent_errors() {
        let mut engine = seeded_engine();
        let ctx = LiveContext {
            upcoming: 'p',
            wpm: 35.0,
            accuracy: 0.95,
            session_minutes: 5.0,
            timestamp_ms: Some(1_700_000_000_000),
        };

        let mut ts = 0;
        for _ in 0..10 {
            engine.record_keystroke(&event('p', ts, true));
            ts += 300;
        }
        let calm = engine.predict_risk(&ctx);

        for _ in 0..8 {
            engine.record_keystroke(&event('p', ts, false));
            ts += 300;
        }
        let risky = engine.predict_risk(&ctx);
        assert!(risky > calm, "risk {risky} should exceed {calm}");
    }

    #[test]
    fn test_end_session_builds_learning_curve() {
        let mut engine = seeded_engine();
        for session in 0..3 {
            let base = session as i64 * 100_000;
            for i in 0..10 {
                engine.record_keystroke(&event('m', base + 300 * i, i >= session));
            }
            engine.end_session();
        }
        assert_eq!(engine.session_index(), 3);
        let state = engine.keys.get(&'m').unwrap();
        assert_eq!(state.learning_curve.len(), 3);
    }

    #[test]
    fn test_reset_wipes_everything_atomically() {
        let mut engine = seeded_engine();
        for i in 0..20 {
            engine.record_keystroke(&event('t', 300 * i, true));
        }
        engine.end_session();
        engine.reset();
        assert_eq!(engine.tracked_keys(), 0);
        assert_eq!(engine.total_keystrokes(), 0);
        assert_eq!(engine.session_index(), 0);
        assert!(engine.ngrams.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip_is_lossless() {
        let mut engine = seeded_engine();
        let mut ts = 0;
        for i in 0..30 {
            engine.record_keystroke(&KeystrokeEvent {
                key: if i % 3 == 0 { 't' } else { 'h' },
                expected: None,
                timestamp_ms: ts,
                is_correct: i % 4 != 0,
                hesitation_ms: Some(200 + i),
                finger: Some(Finger::RightIndex),
                previous_key: None,
            });
            ts += 400;
        }
        engine.end_session();
        engine.record_intervention_outcome('t', "slowPractice", 0.1);

        let blob = engine.serialize().unwrap();
        let restored =
            WeaknessEngine::deserialize(engine.config().clone(), &blob).unwrap();

        assert_eq!(restored.total_keystrokes(), engine.total_keystrokes());
        assert_eq!(restored.session_index(), engine.session_index());
        let original = engine.keys.get(&'t').unwrap();
        let roundtrip = restored.keys.get(&'t').unwrap();
        assert_eq!(roundtrip.accuracy, original.accuracy);
        assert_eq!(roundtrip.speed, original.speed);
        assert_eq!(roundtrip.skill_state, original.skill_state);
        assert_eq!(roundtrip.state_probabilities, original.state_probabilities);
        assert_eq!(roundtrip.ease_factor, original.ease_factor);
        assert_eq!(roundtrip.learning_curve, original.learning_curve);
        assert_eq!(
            roundtrip.intervention_effects,
            original.intervention_effects
        );
        assert_eq!(
            restored.ngrams.to_entries(),
            engine.ngrams.to_entries()
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_version() {
        let blob = r#"{"version":"999","sessionIndex":0,"totalKeystrokes":0,"keys":[],"ngrams":[]}"#;
        let result = WeaknessEngine::deserialize(EngineConfig::default(), blob);
        assert!(result.is_err());
    }

    #[test]
    fn test_intervention_recommendations_prefer_measured_effects() {
        let mut engine = seeded_engine();
        let mut ts = 0;
        for i in 0..30 {
            engine.record_keystroke(&event('w', ts, i % 3 != 0));
            ts += 300;
        }
        engine.record_intervention_outcome('w', "speedBurst", 0.02);
        engine.record_intervention_outcome('w', "slowPractice", 0.2);
        let report = engine.analyze('w');
        assert_eq!(report.recommended_interventions[0], "slowPractice");
    }
}
