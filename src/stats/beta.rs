//! Conjugate posteriors for per-key competence: a Beta-Binomial model over
//! accuracy and a Gamma model over inter-keystroke latency.

use serde::{Deserialize, Serialize};

use super::special::inverse_incomplete_beta;

/// Observations beyond which the confidence proxy saturates at 1.
const CONFIDENCE_SCALE: f64 = 100.0;

const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredibleInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

/// Beta posterior over a key's success probability. The stored `alpha`/`beta`
/// already include the prior, so the posterior dominates the prior
/// componentwise by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetaPosterior {
    pub prior_alpha: f64,
    pub prior_beta: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    pub fn new(prior_alpha: f64, prior_beta: f64) -> Self {
        let prior_alpha = prior_alpha.max(EPSILON);
        let prior_beta = prior_beta.max(EPSILON);
        Self {
            prior_alpha,
            prior_beta,
            alpha: prior_alpha,
            beta: prior_beta,
        }
    }

    /// Neutral uniform-ish prior used for keys that were never observed.
    pub fn uninformative() -> Self {
        Self::new(1.0, 1.0)
    }

    pub fn observe(&mut self, success: bool) {
        if success {
            self.alpha += 1.0;
        } else {
            self.beta += 1.0;
        }
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let s = self.alpha + self.beta;
        self.alpha * self.beta / (s * s * (s + 1.0))
    }

    /// Observations contributing beyond the prior.
    pub fn effective_sample_size(&self) -> f64 {
        (self.alpha + self.beta - self.prior_alpha - self.prior_beta).max(0.0)
    }

    /// `min(1, ess / 100)`: a cheap proxy, not a calibrated probability.
    pub fn confidence(&self) -> f64 {
        (self.effective_sample_size() / CONFIDENCE_SCALE).min(1.0)
    }

    /// Equal-tailed posterior credible interval at `level`. The bounds are
    /// re-ordered around the mean so a non-converged inversion still yields
    /// `lower <= mean <= upper`.
    pub fn credible_interval(&self, level: f64) -> CredibleInterval {
        let level = level.clamp(0.0, 1.0);
        let tail = (1.0 - level) / 2.0;
        let mean = self.mean();
        let lower = inverse_incomplete_beta(self.alpha, self.beta, tail).min(mean);
        let upper = inverse_incomplete_beta(self.alpha, self.beta, 1.0 - tail).max(mean);
        CredibleInterval {
            lower: lower.max(0.0),
            upper: upper.min(1.0),
            level,
        }
    }
}

/// Gamma posterior over a key's typing rate (keys per second), conjugate to
/// exponential inter-keystroke latencies. `rate` accumulates observed
/// latency in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaPosterior {
    pub shape: f64,
    pub rate: f64,
}

impl GammaPosterior {
    pub fn new(shape: f64, rate: f64) -> Self {
        Self {
            shape: shape.max(EPSILON),
            rate: rate.max(EPSILON),
        }
    }

    pub fn observe(&mut self, latency_ms: f64) {
        if latency_ms <= 0.0 || !latency_ms.is_finite() {
            return;
        }
        self.shape += 1.0;
        self.rate += latency_ms / 1000.0;
    }

    /// Posterior mean typing rate in keys per second.
    pub fn mean_rate(&self) -> f64 {
        self.shape / self.rate
    }

    /// Expected inter-keystroke latency in milliseconds.
    pub fn expected_latency_ms(&self) -> f64 {
        1000.0 * self.rate / self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_is_exact_ratio() {
        for (a, b) in [(1.0, 1.0), (9.0, 3.0), (0.5, 0.5), (20.0, 80.0)] {
            let post = BetaPosterior {
                prior_alpha: a,
                prior_beta: b,
                alpha: a,
                beta: b,
            };
            let mean = post.mean();
            assert!(mean > 0.0 && mean < 1.0);
            assert_eq!(mean, a / (a + b));
        }
    }

    #[test]
    fn test_posterior_dominates_prior() {
        let mut post = BetaPosterior::new(1.0, 1.0);
        for i in 0..50 {
            post.observe(i % 3 != 0);
            assert!(post.alpha >= post.prior_alpha);
            assert!(post.beta >= post.prior_beta);
        }
    }

    #[test]
    fn test_interval_brackets_mean() {
        let mut post = BetaPosterior::new(1.0, 1.0);
        for _ in 0..8 {
            post.observe(true);
        }
        for _ in 0..2 {
            post.observe(false);
        }
        assert!((post.mean() - 0.75).abs() < 1e-12);

        let interval = post.credible_interval(0.95);
        assert!(interval.lower >= 0.0);
        assert!(interval.lower <= post.mean());
        assert!(post.mean() <= interval.upper);
        assert!(interval.upper <= 1.0);
        assert!(interval.lower < 0.75 && interval.upper > 0.75);
    }

    #[test]
    fn test_larger_sample_tightens_interval() {
        let mut small = BetaPosterior::new(1.0, 1.0);
        for _ in 0..8 {
            small.observe(true);
        }
        for _ in 0..2 {
            small.observe(false);
        }

        let mut large = BetaPosterior::new(1.0, 1.0);
        for _ in 0..80 {
            large.observe(true);
        }
        for _ in 0..20 {
            large.observe(false);
        }

        let wide = small.credible_interval(0.95);
        let tight = large.credible_interval(0.95);
        assert!(
            wide.upper - wide.lower > tight.upper - tight.lower,
            "10 observations should be wider than 100"
        );
    }

    #[test]
    fn test_variance_formula() {
        let post = BetaPosterior {
            prior_alpha: 1.0,
            prior_beta: 1.0,
            alpha: 3.0,
            beta: 5.0,
        };
        let expected = 3.0 * 5.0 / (8.0 * 8.0 * 9.0);
        assert!((post.variance() - expected).abs() < 1e-15);
    }

    #[test]
    fn test_confidence_saturates() {
        let mut post = BetaPosterior::new(1.0, 1.0);
        assert_eq!(post.confidence(), 0.0);
        for _ in 0..150 {
            post.observe(true);
        }
        assert_eq!(post.confidence(), 1.0);
    }

    #[test]
    fn test_gamma_latency_tracking() {
        let mut speed = GammaPosterior::new(2.0, 0.5);
        for _ in 0..100 {
            speed.observe(200.0);
        }
        // Posterior pulls toward the observed 200ms latency.
        let expected = speed.expected_latency_ms();
        assert!((expected - 200.0).abs() < 20.0, "got {expected}");
        // Garbage observations are ignored.
        speed.observe(-5.0);
        speed.observe(f64::NAN);
        assert_eq!(speed.shape, 102.0);
    }
}
