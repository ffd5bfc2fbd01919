//! Bigram/trigram difficulty tracking over a rolling buffer of the last few
//! keystrokes. Spans that look like pauses rather than transitions (over
//! five seconds, or negative after clock skew) are discarded, as is anything
//! containing a non-letter key.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::config::NgramParams;

const SEQUENCE_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy)]
struct SequenceSample {
    key: char,
    timestamp_ms: i64,
    is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NgramStat {
    pub attempts: u32,
    pub errors: u32,
    pub total_time_ms: f64,
    pub avg_time_ms: f64,
    pub error_rate: f64,
    pub last_typed_ms: i64,
}

impl NgramStat {
    fn record(&mut self, span_ms: f64, had_error: bool, now_ms: i64) {
        self.attempts += 1;
        if had_error {
            self.errors += 1;
        }
        self.total_time_ms += span_ms;
        self.avg_time_ms = self.total_time_ms / self.attempts as f64;
        self.error_rate = self.errors as f64 / self.attempts as f64;
        self.last_typed_ms = now_ms;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NgramReportEntry {
    pub ngram: String,
    pub attempts: u32,
    pub avg_time_ms: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone)]
pub struct NgramAnalyzer {
    params: NgramParams,
    sequence: VecDeque<SequenceSample>,
    stats: HashMap<String, NgramStat>,
}

impl NgramAnalyzer {
    pub fn new(params: NgramParams) -> Self {
        Self {
            params,
            sequence: VecDeque::with_capacity(SEQUENCE_CAPACITY),
            stats: HashMap::new(),
        }
    }

    /// Feed one keystroke; updates the bigram ending at it and, once three
    /// or more are buffered, the trigram.
    pub fn observe(&mut self, key: char, timestamp_ms: i64, is_correct: bool) {
        self.sequence.push_back(SequenceSample {
            key,
            timestamp_ms,
            is_correct,
        });
        if self.sequence.len() > SEQUENCE_CAPACITY {
            self.sequence.pop_front();
        }

        if self.sequence.len() >= 2 {
            self.record_span(2);
        }
        if self.sequence.len() >= 3 {
            self.record_span(3);
        }
    }

    fn record_span(&mut self, len: usize) {
        let start = self.sequence.len() - len;
        let samples: Vec<SequenceSample> =
            self.sequence.iter().skip(start).copied().collect();

        if !samples.iter().all(|s| s.key.is_ascii_lowercase()) {
            return;
        }

        let span_ms = samples[len - 1].timestamp_ms - samples[0].timestamp_ms;
        if span_ms < 0 || span_ms > self.params.max_span_ms {
            return;
        }

        let had_error = samples.iter().any(|s| !s.is_correct);
        let ngram: String = samples.iter().map(|s| s.key).collect();
        let now_ms = samples[len - 1].timestamp_ms;

        self.stats
            .entry(ngram)
            .or_default()
            .record(span_ms as f64, had_error, now_ms);
    }

    /// Clear the rolling buffer. Called at the start of each exercise so a
    /// new text does not inherit the previous exercise's tail.
    pub fn reset_sequence(&mut self) {
        self.sequence.clear();
    }

    pub fn get(&self, ngram: &str) -> Option<&NgramStat> {
        self.stats.get(ngram)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// N-grams ranked by average span time, slowest first.
    pub fn slowest(&self, limit: usize) -> Vec<NgramReportEntry> {
        let mut entries: Vec<NgramReportEntry> = self
            .stats
            .iter()
            .filter(|(_, s)| s.attempts >= self.params.min_attempts)
            .map(|(k, s)| Self::entry(k, s))
            .collect();
        entries.sort_by(|a, b| {
            b.avg_time_ms
                .partial_cmp(&a.avg_time_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(limit);
        entries
    }

    /// N-grams ranked by error rate, worst first; clean n-grams excluded.
    pub fn error_prone(&self, limit: usize) -> Vec<NgramReportEntry> {
        let mut entries: Vec<NgramReportEntry> = self
            .stats
            .iter()
            .filter(|(_, s)| s.attempts >= self.params.min_attempts && s.error_rate > 0.0)
            .map(|(k, s)| Self::entry(k, s))
            .collect();
        entries.sort_by(|a, b| {
            b.error_rate
                .partial_cmp(&a.error_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(limit);
        entries
    }

    /// Mean error rate across bigrams containing `key`; `None` when no
    /// bigram has enough attempts yet.
    pub fn bigram_error_rate(&self, key: char) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (ngram, stat) in &self.stats {
            if ngram.len() == 2
                && ngram.contains(key)
                && stat.attempts >= self.params.min_attempts
            {
                sum += stat.error_rate;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    fn entry(ngram: &str, stat: &NgramStat) -> NgramReportEntry {
        NgramReportEntry {
            ngram: ngram.to_string(),
            attempts: stat.attempts,
            avg_time_ms: stat.avg_time_ms,
            error_rate: stat.error_rate,
        }
    }

    pub fn to_entries(&self) -> Vec<(String, NgramStat)> {
        let mut entries: Vec<(String, NgramStat)> =
            self.stats.iter().map(|(k, s)| (k.clone(), *s)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn from_entries(params: NgramParams, entries: Vec<(String, NgramStat)>) -> Self {
        Self {
            params,
            sequence: VecDeque::with_capacity(SEQUENCE_CAPACITY),
            stats: entries.into_iter().collect(),
        }
    }

    pub fn clear(&mut self) {
        self.sequence.clear();
        self.stats.clear();
    }
}

impl Default for NgramAnalyzer {
    fn default() -> Self {
        Self::new(NgramParams::default())
    }
}
