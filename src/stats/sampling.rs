//! Seedable sampling routines: standard normal (Box-Muller), Gamma
//! (Marsaglia-Tsang), Beta via two Gamma draws, and Thompson draws from a
//! key's accuracy posterior.
//!
//! The generator is injected so tests can pin a seed; production callers
//! default to a time-derived seed.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::beta::BetaPosterior;

const EPSILON: f64 = 1e-10;

/// Rejection-loop cap for the Marsaglia-Tsang sampler.
const MAX_GAMMA_ITERATIONS: usize = 1000;

/// Boost-and-retry depth cap for shape < 1.
const MAX_GAMMA_RECURSION: usize = 10;

#[derive(Debug, Clone)]
pub struct Sampler {
    rng: ChaCha8Rng,
}

impl Sampler {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Time-derived seed for production use.
    pub fn from_entropy() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42);
        Self::from_seed(seed)
    }

    pub fn uniform(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Standard normal via Box-Muller.
    pub fn normal(&mut self) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(EPSILON);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Gamma(shape, scale) draw, Marsaglia-Tsang (2000).
    pub fn gamma(&mut self, shape: f64, scale: f64) -> f64 {
        self.gamma_bounded(shape, scale, 0)
    }

    fn gamma_bounded(&mut self, shape: f64, scale: f64, depth: usize) -> f64 {
        if shape <= 0.0 {
            return 0.0;
        }
        if depth >= MAX_GAMMA_RECURSION {
            return shape * scale;
        }

        // Boost-and-retry: draw at shape + 1 and scale down.
        if shape < 1.0 {
            let u: f64 = self.rng.gen::<f64>().max(EPSILON);
            return self.gamma_bounded(shape + 1.0, scale, depth + 1) * u.powf(1.0 / shape);
        }

        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();

        for _ in 0..MAX_GAMMA_ITERATIONS {
            let x = self.normal();
            let v_term = 1.0 + c * x;
            if v_term <= 0.0 {
                continue;
            }

            let v = v_term.powi(3);
            let u: f64 = self.rng.gen();
            let x2 = x * x;

            // Squeeze check, then the exact acceptance bound.
            if u < 1.0 - 0.0331 * x2 * x2 {
                return d * v * scale;
            }
            if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
                return d * v * scale;
            }
        }

        // Iteration budget exhausted; fall back to the expectation.
        shape * scale
    }

    /// Beta(alpha, beta) draw from two independent Gamma draws.
    pub fn beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let a = alpha.max(EPSILON);
        let b = beta.max(EPSILON);
        let x = self.gamma(a, 1.0);
        let y = self.gamma(b, 1.0);
        let sum = x + y;
        if sum > 0.0 && sum.is_finite() {
            x / sum
        } else {
            0.5
        }
    }

    /// One Thompson draw from the accuracy posterior.
    pub fn thompson(&mut self, posterior: &BetaPosterior) -> f64 {
        self.beta(posterior.alpha, posterior.beta)
    }
}
