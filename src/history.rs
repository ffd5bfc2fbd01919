//! Bounded, append-only time series used for per-key rolling state.
//!
//! Each tracked entity keeps several of these: attempt outcomes, success
//! marks and inter-keystroke latencies. Pruning drops the excess oldest
//! entries in a single batch so the length bound holds after every append.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::PruneStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry<T> {
    pub timestamp_ms: i64,
    pub value: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySeries<T> {
    entries: VecDeque<HistoryEntry<T>>,
    max_size: usize,
    strategy: PruneStrategy,
}

impl<T> HistorySeries<T> {
    pub fn new(max_size: usize) -> Self {
        Self::with_strategy(max_size, PruneStrategy::Oldest)
    }

    pub fn with_strategy(max_size: usize, strategy: PruneStrategy) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(64)),
            max_size: max_size.max(1),
            strategy,
        }
    }

    pub fn add(&mut self, value: T, timestamp_ms: i64) {
        self.entries.push_back(HistoryEntry {
            timestamp_ms,
            value,
        });
        if self.entries.len() > self.max_size {
            self.prune();
        }
    }

    fn prune(&mut self) {
        let excess = self.entries.len().saturating_sub(self.max_size);
        match self.strategy {
            PruneStrategy::Oldest => {
                self.entries.drain(..excess);
            }
            PruneStrategy::Decay => {
                // Thin the old end instead of cutting it off entirely: drop
                // every other entry among the oldest, then fall back to a
                // front drain if that was not enough.
                let thin_zone = (2 * excess).min(self.entries.len());
                let mut kept: VecDeque<HistoryEntry<T>> = self
                    .entries
                    .drain(..)
                    .enumerate()
                    .filter_map(|(i, e)| (i >= thin_zone || i % 2 == 1).then_some(e))
                    .collect();
                let still_over = kept.len().saturating_sub(self.max_size);
                kept.drain(..still_over);
                self.entries = kept;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry<T>> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry<T>> {
        self.entries.back()
    }

    /// The most recent `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &HistoryEntry<T>> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }

    /// Entries with `timestamp_ms >= now_ms - window_ms`.
    pub fn window(&self, window_ms: i64, now_ms: i64) -> impl Iterator<Item = &HistoryEntry<T>> {
        let cutoff = now_ms - window_ms;
        self.entries.iter().filter(move |e| e.timestamp_ms >= cutoff)
    }
}

impl HistorySeries<f64> {
    /// Left-to-right exponential smoothing seeded by the first value.
    pub fn ewma(&self, alpha: f64) -> Option<f64> {
        let mut iter = self.entries.iter();
        let mut acc = iter.next()?.value;
        for entry in iter {
            acc = alpha * entry.value + (1.0 - alpha) * acc;
        }
        Some(acc)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let sum: f64 = self.entries.iter().map(|e| e.value).sum();
        Some(sum / self.entries.len() as f64)
    }

    /// Nearest-rank percentile over all stored values, `p` in [0, 1].
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = self.entries.iter().map(|e| e.value).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = (p.clamp(0.0, 1.0) * (values.len() - 1) as f64).round() as usize;
        Some(values[rank])
    }

    /// Folds `fn` over the values inside the window; `None` when the window
    /// holds nothing.
    pub fn aggregate<F>(&self, window_ms: i64, now_ms: i64, f: F) -> Option<f64>
    where
        F: Fn(&[f64]) -> f64,
    {
        let values: Vec<f64> = self.window(window_ms, now_ms).map(|e| e.value).collect();
        if values.is_empty() {
            None
        } else {
            Some(f(&values))
        }
    }
}
