//! Instantaneous error-risk prediction for the next keystroke.
//!
//! This runs inside the keystroke handler, so it is a handful of clamped
//! multiply-adds over features the engine already has on hand. No sampling,
//! no interval inversion, no allocation beyond the context.

use crate::config::RiskWeights;

/// Fully-resolved features for one prediction. The engine fills the
/// key/bigram fields from its own state; the session fields come from the
/// caller.
#[derive(Debug, Clone, Copy)]
pub struct RiskContext {
    /// Error estimate for the upcoming key (1 - posterior accuracy mean).
    pub key_error_estimate: f64,
    /// Whether the upcoming key is currently flagged weak.
    pub key_is_weak: bool,
    /// Error rate of the bigram formed with the previous key, if tracked.
    pub bigram_error_rate: f64,
    /// Errors among the last ten keystrokes, 0-10.
    pub recent_errors: u32,
    /// Session-level accuracy in [0, 1].
    pub session_accuracy: f64,
    pub wpm: f64,
    pub session_minutes: f64,
    pub hour_of_day: u32,
}

pub struct RiskPredictor {
    weights: RiskWeights,
}

impl RiskPredictor {
    pub fn new(weights: RiskWeights) -> Self {
        Self { weights }
    }

    /// Error probability for the next keystroke, in [0, 1].
    pub fn predict(&self, ctx: &RiskContext) -> f64 {
        let w = &self.weights;

        let key_term = ctx.key_error_estimate.clamp(0.0, 1.0)
            * if ctx.key_is_weak { 1.25 } else { 1.0 };
        let bigram_term = ctx.bigram_error_rate.clamp(0.0, 1.0);
        let momentum_term = (ctx.recent_errors.min(10) as f64) / 10.0;
        let accuracy_term = 1.0 - ctx.session_accuracy.clamp(0.0, 1.0);

        // Typing well above the reference pace trades accuracy for speed.
        let pace_term = ((ctx.wpm / w.reference_wpm.max(1.0)) - 1.0).clamp(0.0, 1.0);

        let fatigue_term =
            (ctx.session_minutes / w.fatigue_onset_minutes.max(1.0) - 1.0).clamp(0.0, 1.0);

        let late_term = if ctx.hour_of_day < 6 || ctx.hour_of_day >= 23 {
            1.0
        } else {
            0.0
        };

        let risk = w.key_difficulty * key_term
            + w.bigram_difficulty * bigram_term
            + w.error_momentum * momentum_term
            + w.accuracy * accuracy_term
            + w.pace * pace_term
            + w.fatigue * fatigue_term
            + w.late_hour * late_term;

        risk.clamp(0.0, 1.0)
    }
}

impl Default for RiskPredictor {
    fn default() -> Self {
        Self::new(RiskWeights::default())
    }
}
