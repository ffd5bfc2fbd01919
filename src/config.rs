use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PruneStrategy {
    #[default]
    Oldest,
    Decay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryParams {
    pub max_size: usize,
    pub strategy: PruneStrategy,
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            max_size: 50,
            strategy: PruneStrategy::Oldest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgramParams {
    pub min_attempts: u32,
    pub max_span_ms: i64,
    pub report_limit: usize,
}

impl Default for NgramParams {
    fn default() -> Self {
        Self {
            min_attempts: 5,
            max_span_ms: 5000,
            report_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceParams {
    pub prior_alpha: f64,
    pub prior_beta: f64,
    pub speed_prior_shape: f64,
    pub speed_prior_rate: f64,
    pub credible_level: f64,
    pub baseline_latency_ms: f64,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            prior_alpha: 1.0,
            prior_beta: 1.0,
            speed_prior_shape: 2.0,
            speed_prior_rate: 0.5,
            credible_level: 0.95,
            baseline_latency_ms: 300.0,
        }
    }
}

/// Blend weights for the three weakness predictors. Renormalized at use so a
/// hand-edited config that does not sum to 1 degrades instead of erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub bayesian: f64,
    pub hmm: f64,
    pub temporal: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            bayesian: 0.5,
            hmm: 0.3,
            temporal: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub base_interval_days: f64,
    pub min_interval_days: f64,
    pub max_interval_days: f64,
    pub min_ease: f64,
    pub max_ease: f64,
    pub mastery_threshold: f64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            base_interval_days: 1.0,
            min_interval_days: 1.0,
            max_interval_days: 30.0,
            min_ease: 1.3,
            max_ease: 2.5,
            mastery_threshold: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendParams {
    pub min_samples: usize,
    pub plateau_variance_threshold: f64,
    pub plateau_slope_threshold: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            min_samples: 5,
            plateau_variance_threshold: 0.01,
            plateau_slope_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    pub key_difficulty: f64,
    pub bigram_difficulty: f64,
    pub error_momentum: f64,
    pub accuracy: f64,
    pub pace: f64,
    pub fatigue: f64,
    pub late_hour: f64,
    pub reference_wpm: f64,
    pub fatigue_onset_minutes: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            key_difficulty: 0.30,
            bigram_difficulty: 0.20,
            error_momentum: 0.20,
            accuracy: 0.15,
            pace: 0.05,
            fatigue: 0.07,
            late_hour: 0.03,
            reference_wpm: 40.0,
            fatigue_onset_minutes: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub history: HistoryParams,
    pub ngram: NgramParams,
    pub inference: InferenceParams,
    pub ensemble: EnsembleWeights,
    pub scheduler: SchedulerParams,
    pub trend: TrendParams,
    pub risk: RiskWeights,
    /// Coalescing window for debounced analysis requests.
    pub debounce_ms: u64,
    /// Keystrokes per session-position bin.
    pub session_bin_size: u32,
    pub session_bins: usize,
    /// Fixed seed for the sampler; `None` seeds from system time.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history: HistoryParams::default(),
            ngram: NgramParams::default(),
            inference: InferenceParams::default(),
            ensemble: EnsembleWeights::default(),
            scheduler: SchedulerParams::default(),
            trend: TrendParams::default(),
            risk: RiskWeights::default(),
            debounce_ms: 300,
            session_bin_size: 25,
            session_bins: 10,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TYPESKILL_DEBOUNCE_MS") {
            config.debounce_ms = val.parse().unwrap_or(config.debounce_ms);
        }
        if let Ok(val) = std::env::var("TYPESKILL_ENSEMBLE_BAYESIAN") {
            config.ensemble.bayesian = val.parse().unwrap_or(config.ensemble.bayesian);
        }
        if let Ok(val) = std::env::var("TYPESKILL_ENSEMBLE_HMM") {
            config.ensemble.hmm = val.parse().unwrap_or(config.ensemble.hmm);
        }
        if let Ok(val) = std::env::var("TYPESKILL_ENSEMBLE_TEMPORAL") {
            config.ensemble.temporal = val.parse().unwrap_or(config.ensemble.temporal);
        }
        if let Ok(val) = std::env::var("TYPESKILL_SEED") {
            config.seed = val.parse().ok();
        }

        config
    }
}
