//! Adaptive weakness detection and practice prioritization for typing
//! practice.
//!
//! The engine ingests a stream of keystroke events, maintains per-key
//! Beta-Binomial accuracy and Gamma latency posteriors, tracks a latent
//! skill state per key through an emission-adjusted stochastic HMM step,
//! blends three predictors into one weakness score, and derives practice
//! priorities, spaced-repetition review dates and a live next-keystroke
//! error risk.
//!
//! [`WeaknessEngine`] is the synchronous core; [`EngineService`] wraps it
//! with explicit initialization, debounced analysis and fire-and-forget
//! persistence.

#![deny(clippy::all)]

pub mod config;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod history;
pub mod hmm;
pub mod ngram;
pub mod persistence;
pub mod risk;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod trend;
pub mod types;

pub use config::{EngineConfig, EnsembleWeights, PruneStrategy};
pub use engine::{LiveContext, WeaknessEngine};
pub use ensemble::EnsemblePredictor;
pub use error::EngineError;
pub use history::{HistoryEntry, HistorySeries};
pub use ngram::{NgramAnalyzer, NgramReportEntry, NgramStat};
pub use persistence::{EngineSnapshot, MemoryStore, StateStore, SNAPSHOT_VERSION};
pub use risk::{RiskContext, RiskPredictor};
pub use scheduler::{PracticeScheduler, PriorityInput};
pub use service::EngineService;
pub use stats::{BetaPosterior, CredibleInterval, GammaPosterior, Sampler};
pub use trend::{TrendAnalyzer, TrendDirection, TrendSignal};
pub use types::{
    DashboardSummary, EnsembleBreakdown, Finger, KeyState, KeySummary, KeystrokeEvent,
    SkillState, WeaknessReport,
};
