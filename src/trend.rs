//! Least-squares trend over a key's learning curve. Drives the scheduler's
//! trend bonus, plateau detection and the plateau-date extrapolation.

use serde::{Deserialize, Serialize};

use crate::config::TrendParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    #[default]
    Flat,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrendSignal {
    pub slope: f64,
    pub variance: f64,
    pub direction: TrendDirection,
    pub plateau: bool,
}

pub struct TrendAnalyzer {
    params: TrendParams,
}

impl TrendAnalyzer {
    pub fn new(params: TrendParams) -> Self {
        Self { params }
    }

    pub fn assess(&self, samples: &[f64]) -> TrendSignal {
        if samples.len() < self.params.min_samples {
            return TrendSignal::default();
        }

        let slope = compute_slope(samples);
        let variance = compute_variance(samples);

        let direction = if slope > self.params.plateau_slope_threshold {
            TrendDirection::Up
        } else if slope < -self.params.plateau_slope_threshold {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        };

        let plateau = variance < self.params.plateau_variance_threshold
            && slope.abs() < self.params.plateau_slope_threshold;

        TrendSignal {
            slope,
            variance,
            direction,
            plateau,
        }
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(TrendParams::default())
    }
}

fn compute_slope(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }

    let n = samples.len() as f64;
    let sum_x: f64 = (0..samples.len()).map(|i| i as f64).sum();
    let sum_y: f64 = samples.iter().sum();
    let sum_xy: f64 = samples
        .iter()
        .enumerate()
        .map(|(i, y)| i as f64 * y)
        .sum();
    let sum_xx: f64 = (0..samples.len()).map(|i| (i as f64).powi(2)).sum();

    let denominator = n * sum_xx - sum_x.powi(2);
    if denominator.abs() < 1e-10 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

fn compute_variance(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64
}
