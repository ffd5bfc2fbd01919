//! Practice prioritization and spaced-repetition scheduling.
//!
//! Priority is a 0-100 urgency score built from the accuracy estimate and a
//! set of additive pressure terms. Review intervals follow a modified SM-2:
//! a per-key ease factor adjusted by recent accuracy, grown geometrically
//! with the correct streak.

use serde::{Deserialize, Serialize};

use crate::config::SchedulerParams;
use crate::types::SkillState;

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityInput {
    pub accuracy_estimate: f64,
    pub skill_state: SkillState,
    pub recent_trend: f64,
    pub confidence: f64,
    pub days_since_practice: f64,
}

pub struct PracticeScheduler {
    params: SchedulerParams,
}

impl PracticeScheduler {
    pub fn new(params: SchedulerParams) -> Self {
        Self { params }
    }

    /// Practice urgency in [0, 100].
    pub fn priority(&self, input: &PriorityInput) -> f64 {
        let mut priority = (1.0 - input.accuracy_estimate.clamp(0.0, 1.0)) * 50.0;

        if input.skill_state == SkillState::Regressing {
            priority += 20.0;
        }
        if input.recent_trend < 0.0 {
            priority += input.recent_trend.abs() * 15.0;
        }
        if input.confidence < 0.5 {
            priority += (0.5 - input.confidence) * 10.0;
        }
        if input.days_since_practice > 1.0 {
            priority += (input.days_since_practice * 2.0).min(15.0);
        }

        priority.clamp(0.0, 100.0)
    }

    /// SM-2 ease adjustment from the latest accuracy estimate, clamped to
    /// the configured band.
    pub fn adjust_ease(&self, ease: f64, accuracy: f64) -> f64 {
        let mut ease = ease;
        if accuracy < 0.6 {
            ease -= 0.8;
        } else if accuracy < 0.8 {
            ease -= 0.15;
        } else if accuracy > 0.95 {
            ease += 0.1;
        }
        ease.clamp(self.params.min_ease, self.params.max_ease)
    }

    /// Review interval in days: `base * ease^consecutive_correct`, clamped.
    pub fn optimal_interval_days(&self, ease: f64, consecutive_correct: u32) -> f64 {
        let ease = ease.clamp(self.params.min_ease, self.params.max_ease);
        let interval = self.params.base_interval_days * ease.powi(consecutive_correct as i32);
        interval.clamp(self.params.min_interval_days, self.params.max_interval_days)
    }

    pub fn next_review_ms(&self, now_ms: i64, interval_days: f64) -> i64 {
        now_ms + (interval_days * MS_PER_DAY) as i64
    }

    /// Sessions until the exponential learning curve
    /// `accuracy(n) = 1 - (1 - a0) * exp(-r * n)` reaches `threshold`.
    /// Returns 0 when the threshold is already met and infinity when the
    /// learning rate is non-positive.
    pub fn sessions_to_mastery(&self, accuracy: f64, learning_rate: f64, threshold: f64) -> f64 {
        if accuracy >= threshold {
            return 0.0;
        }
        if learning_rate <= 0.0 {
            return f64::INFINITY;
        }
        let sessions = ((1.0 - accuracy) / (1.0 - threshold)).ln() / learning_rate;
        sessions.ceil().max(1.0)
    }

    pub fn mastery_threshold(&self) -> f64 {
        self.params.mastery_threshold
    }
}

impl Default for PracticeScheduler {
    fn default() -> Self {
        Self::new(SchedulerParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scheduler() -> PracticeScheduler {
        PracticeScheduler::default()
    }

    fn input(accuracy: f64) -> PriorityInput {
        PriorityInput {
            accuracy_estimate: accuracy,
            skill_state: SkillState::Proficient,
            recent_trend: 0.0,
            confidence: 0.8,
            days_since_practice: 0.0,
        }
    }

    #[test]
    fn test_priority_base_term() {
        let s = scheduler();
        assert!((s.priority(&input(0.8)) - 10.0).abs() < 1e-12);
        assert!((s.priority(&input(0.0)) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_priority_pressure_terms() {
        let s = scheduler();
        let mut i = input(0.8);
        i.skill_state = SkillState::Regressing;
        assert!((s.priority(&i) - 30.0).abs() < 1e-12);

        i.recent_trend = -0.4;
        assert!((s.priority(&i) - 36.0).abs() < 1e-12);

        i.confidence = 0.3;
        assert!((s.priority(&i) - 38.0).abs() < 1e-12);

        i.days_since_practice = 3.0;
        assert!((s.priority(&i) - 44.0).abs() < 1e-12);

        // Staleness bonus saturates at 15.
        i.days_since_practice = 30.0;
        assert!((s.priority(&i) - 53.0).abs() < 1e-12);
    }

    #[test]
    fn test_priority_clamped_to_hundred() {
        let s = scheduler();
        let i = PriorityInput {
            accuracy_estimate: 0.0,
            skill_state: SkillState::Regressing,
            recent_trend: -5.0,
            confidence: 0.0,
            days_since_practice: 40.0,
        };
        assert_eq!(s.priority(&i), 100.0);
    }

    #[test]
    fn test_ease_adjustment_band() {
        let s = scheduler();
        assert!((s.adjust_ease(2.5, 0.5) - 1.7).abs() < 1e-12);
        assert!((s.adjust_ease(2.5, 0.7) - 2.35).abs() < 1e-12);
        assert_eq!(s.adjust_ease(2.5, 0.99), 2.5);
        assert_eq!(s.adjust_ease(1.4, 0.3), 1.3);
    }

    #[test]
    fn test_interval_growth_and_clamp() {
        let s = scheduler();
        assert_eq!(s.optimal_interval_days(2.5, 0), 1.0);
        assert!((s.optimal_interval_days(2.5, 2) - 6.25).abs() < 1e-12);
        assert_eq!(s.optimal_interval_days(2.5, 10), 30.0);
    }

    #[test]
    fn test_sessions_to_mastery_scenarios() {
        let s = scheduler();
        let n = s.sessions_to_mastery(0.80, 0.1, 0.95);
        assert!(n >= 1.0 && n.is_finite());
        assert_eq!(n, n.ceil());

        assert_eq!(s.sessions_to_mastery(0.97, 0.1, 0.95), 0.0);
        assert!(s.sessions_to_mastery(0.5, 0.0, 0.95).is_infinite());
        assert!(s.sessions_to_mastery(0.5, -0.2, 0.95).is_infinite());
    }

    #[test]
    fn test_sessions_to_mastery_minimum_one() {
        let s = scheduler();
        // Just under threshold with a huge learning rate still costs one
        // session.
        assert_eq!(s.sessions_to_mastery(0.949, 50.0, 0.95), 1.0);
    }

    proptest! {
        #[test]
        fn prop_interval_non_decreasing_in_streak(
            accuracy in 0.8f64..1.0,
            streak in 0u32..20,
        ) {
            let s = scheduler();
            let ease = s.adjust_ease(2.5, accuracy);
            let shorter = s.optimal_interval_days(ease, streak);
            let longer = s.optimal_interval_days(ease, streak + 1);
            prop_assert!(longer >= shorter);
        }

        #[test]
        fn prop_priority_always_in_range(
            accuracy in 0.0f64..1.0,
            trend in -2.0f64..2.0,
            confidence in 0.0f64..1.0,
            days in 0.0f64..60.0,
            state_idx in 0usize..4,
        ) {
            let s = scheduler();
            let p = s.priority(&PriorityInput {
                accuracy_estimate: accuracy,
                skill_state: SkillState::from_index(state_idx),
                recent_trend: trend,
                confidence,
                days_since_practice: days,
            });
            prop_assert!((0.0..=100.0).contains(&p));
        }
    }
}
