use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::history::HistorySeries;
use crate::ngram::NgramReportEntry;
use crate::stats::{BetaPosterior, CredibleInterval, GammaPosterior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Finger {
    LeftPinky,
    LeftRing,
    LeftMiddle,
    LeftIndex,
    RightIndex,
    RightMiddle,
    RightRing,
    RightPinky,
    Thumb,
}

/// One observed keystroke, as delivered by the capture layer. Everything but
/// `key` is optional so a sparse or malformed event degrades to defaults
/// instead of being rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeystrokeEvent {
    pub key: char,
    pub expected: Option<char>,
    pub timestamp_ms: i64,
    pub is_correct: bool,
    pub hesitation_ms: Option<i64>,
    pub finger: Option<Finger>,
    pub previous_key: Option<char>,
}

impl Default for KeystrokeEvent {
    fn default() -> Self {
        Self {
            key: ' ',
            expected: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            is_correct: true,
            hesitation_ms: None,
            finger: None,
            previous_key: None,
        }
    }
}

/// Latent per-key skill state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillState {
    #[default]
    Learning,
    Proficient,
    Mastered,
    Regressing,
}

impl SkillState {
    pub const COUNT: usize = 4;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Proficient => "proficient",
            Self::Mastered => "mastered",
            Self::Regressing => "regressing",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "proficient" => Self::Proficient,
            "mastered" => Self::Mastered,
            "regressing" => Self::Regressing,
            _ => Self::Learning,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Learning => 0,
            Self::Proficient => 1,
            Self::Mastered => 2,
            Self::Regressing => 3,
        }
    }

    pub fn from_index(i: usize) -> Self {
        match i {
            1 => Self::Proficient,
            2 => Self::Mastered,
            3 => Self::Regressing,
            _ => Self::Learning,
        }
    }
}

pub const HOURS_PER_DAY: usize = 24;

/// Everything the engine tracks for one physical key. Created lazily on the
/// first observation, mutated on every subsequent one, destroyed only by a
/// full reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyState {
    pub accuracy: BetaPosterior,
    pub speed: GammaPosterior,
    pub skill_state: SkillState,
    /// Post-emission belief row from the last transition; sums to 1.
    pub state_probabilities: [f64; SkillState::COUNT],

    pub attempts: HistorySeries<f64>,
    pub successes: HistorySeries<f64>,
    pub speeds: HistorySeries<f64>,

    pub hour_attempts: [u32; HOURS_PER_DAY],
    pub hour_correct: [u32; HOURS_PER_DAY],
    pub position_attempts: Vec<u32>,
    pub position_correct: Vec<u32>,
    pub adjacent_keys: HashMap<char, u32>,

    pub finger: Option<Finger>,
    pub finger_load: f64,

    /// Accuracy per completed session, oldest first, bounded.
    pub learning_curve: Vec<f64>,
    pub plateau_detected: bool,
    pub optimal_practice_interval_days: f64,

    pub intervention_effects: HashMap<String, f64>,
    pub confounding_factors: Vec<String>,

    pub ease_factor: f64,
    pub consecutive_correct: u32,
    pub last_practiced_ms: i64,

    pub session_attempts: u32,
    pub session_correct: u32,
}

impl KeyState {
    pub const LEARNING_CURVE_CAP: usize = 64;
    const CONTEXT_MIN_ATTEMPTS: u32 = 5;

    pub fn new(config: &EngineConfig, now_ms: i64) -> Self {
        let inference = &config.inference;
        Self {
            accuracy: BetaPosterior::new(inference.prior_alpha, inference.prior_beta),
            speed: GammaPosterior::new(inference.speed_prior_shape, inference.speed_prior_rate),
            skill_state: SkillState::Learning,
            state_probabilities: [1.0, 0.0, 0.0, 0.0],
            attempts: HistorySeries::with_strategy(config.history.max_size, config.history.strategy),
            successes: HistorySeries::with_strategy(
                config.history.max_size,
                config.history.strategy,
            ),
            speeds: HistorySeries::with_strategy(config.history.max_size, config.history.strategy),
            hour_attempts: [0; HOURS_PER_DAY],
            hour_correct: [0; HOURS_PER_DAY],
            position_attempts: vec![0; config.session_bins],
            position_correct: vec![0; config.session_bins],
            adjacent_keys: HashMap::new(),
            finger: None,
            finger_load: 0.0,
            learning_curve: Vec::new(),
            plateau_detected: false,
            optimal_practice_interval_days: config.scheduler.base_interval_days,
            intervention_effects: HashMap::new(),
            confounding_factors: Vec::new(),
            ease_factor: config.scheduler.max_ease,
            consecutive_correct: 0,
            last_practiced_ms: now_ms,
            session_attempts: 0,
            session_correct: 0,
        }
    }

    pub fn observe_hour(&mut self, hour: u32, correct: bool) {
        let hour = (hour as usize).min(HOURS_PER_DAY - 1);
        self.hour_attempts[hour] += 1;
        if correct {
            self.hour_correct[hour] += 1;
        }
    }

    pub fn observe_position(&mut self, bin: usize, correct: bool) {
        if self.position_attempts.is_empty() {
            return;
        }
        let bin = bin.min(self.position_attempts.len() - 1);
        self.position_attempts[bin] += 1;
        if correct {
            self.position_correct[bin] += 1;
        }
    }

    /// Hour of day with the best observed accuracy, requiring a handful of
    /// attempts before an hour qualifies.
    pub fn best_practice_hour(&self) -> Option<u32> {
        self.hour_attempts
            .iter()
            .enumerate()
            .filter(|(_, &n)| n >= Self::CONTEXT_MIN_ATTEMPTS)
            .map(|(h, &n)| (h, self.hour_correct[h] as f64 / n as f64))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(h, _)| h as u32)
    }

    pub fn optimal_session_position(&self) -> Option<usize> {
        self.position_attempts
            .iter()
            .enumerate()
            .filter(|(_, &n)| n >= Self::CONTEXT_MIN_ATTEMPTS)
            .map(|(bin, &n)| (bin, self.position_correct[bin] as f64 / n as f64))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(bin, _)| bin)
    }

    /// Most frequent neighbours, strongest first.
    pub fn correlated_keys(&self, limit: usize) -> Vec<char> {
        let mut pairs: Vec<(char, u32)> =
            self.adjacent_keys.iter().map(|(&k, &n)| (k, n)).collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        pairs.into_iter().take(limit).map(|(k, _)| k).collect()
    }

    /// Mean of the most recent attempt outcomes; posterior mean when the
    /// rolling window is still empty.
    pub fn recent_accuracy(&self, n: usize) -> f64 {
        let mut count = 0usize;
        let mut sum = 0.0;
        for entry in self.attempts.last_n(n) {
            sum += entry.value;
            count += 1;
        }
        if count == 0 {
            self.accuracy.mean()
        } else {
            sum / count as f64
        }
    }

    pub fn end_session(&mut self) {
        if self.session_attempts == 0 {
            return;
        }
        let accuracy = self.session_correct as f64 / self.session_attempts as f64;
        self.learning_curve.push(accuracy);
        if self.learning_curve.len() > Self::LEARNING_CURVE_CAP {
            let excess = self.learning_curve.len() - Self::LEARNING_CURVE_CAP;
            self.learning_curve.drain(..excess);
        }
        self.session_attempts = 0;
        self.session_correct = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleBreakdown {
    pub bayesian: f64,
    pub hmm: f64,
    pub temporal: f64,
    pub blended: f64,
}

/// On-demand snapshot of everything the engine believes about one key.
/// Derived, never authoritative: always recomputable from [`KeyState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaknessReport {
    pub key: char,
    pub accuracy_estimate: f64,
    pub accuracy_interval: CredibleInterval,
    pub expected_latency_ms: f64,
    pub latency_interval_ms: (f64, f64),
    pub skill_state: SkillState,
    pub state_probabilities: [f64; SkillState::COUNT],
    pub weakness_score: f64,
    pub confidence: f64,
    pub practice_priority: f64,
    pub next_practice_ms: i64,
    pub sessions_to_mastery: f64,
    pub best_practice_hour: Option<u32>,
    pub optimal_session_position: Option<usize>,
    pub correlated_keys: Vec<char>,
    pub recommended_interventions: Vec<String>,
    pub components: EnsembleBreakdown,
    pub learning_rate: f64,
    pub predicted_plateau_ms: Option<i64>,
    /// One Thompson draw from the accuracy posterior; intentionally varies
    /// across calls unless the engine is seeded.
    pub exploration_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySummary {
    pub key: char,
    pub accuracy: f64,
    pub expected_latency_ms: f64,
    pub skill_state: SkillState,
    pub practice_priority: f64,
    pub attempts: f64,
}

/// Aggregate read model for UI summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_keystrokes: u64,
    pub session_index: u32,
    pub overall_accuracy: f64,
    pub weakest_keys: Vec<KeySummary>,
    pub slowest_ngrams: Vec<NgramReportEntry>,
    pub error_prone_ngrams: Vec<NgramReportEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_state_round_trip() {
        for state in [
            SkillState::Learning,
            SkillState::Proficient,
            SkillState::Mastered,
            SkillState::Regressing,
        ] {
            assert_eq!(SkillState::parse(state.as_str()), state);
            assert_eq!(SkillState::from_index(state.index()), state);
        }
        assert_eq!(SkillState::parse("garbage"), SkillState::Learning);
    }

    #[test]
    fn test_best_practice_hour_requires_samples() {
        let config = EngineConfig::default();
        let mut key = KeyState::new(&config, 0);
        key.observe_hour(9, true);
        assert_eq!(key.best_practice_hour(), None);

        for _ in 0..5 {
            key.observe_hour(9, true);
            key.observe_hour(22, false);
        }
        assert_eq!(key.best_practice_hour(), Some(9));
    }

    #[test]
    fn test_correlated_keys_ranked_by_count() {
        let config = EngineConfig::default();
        let mut key = KeyState::new(&config, 0);
        key.adjacent_keys.insert('a', 3);
        key.adjacent_keys.insert('b', 7);
        key.adjacent_keys.insert('c', 5);
        assert_eq!(key.correlated_keys(2), vec!['b', 'c']);
    }

    #[test]
    fn test_end_session_appends_learning_curve() {
        let config = EngineConfig::default();
        let mut key = KeyState::new(&config, 0);
        key.session_attempts = 10;
        key.session_correct = 8;
        key.end_session();
        assert_eq!(key.learning_curve, vec![0.8]);
        assert_eq!(key.session_attempts, 0);

        // Empty sessions add nothing.
        key.end_session();
        assert_eq!(key.learning_curve.len(), 1);
    }
}
