//! Metrics sink collaborator

use crate::logger::RingBuffer;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Samples `MemoryMetrics::new` keeps per observation series
pub const DEFAULT_SAMPLE_CAPACITY: usize = 1000;

/// Label pairs attached to a metric sample
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Metrics emitter reachable through the `System` bag
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by one
    fn increment(&self, name: &str, labels: Labels<'_>);

    /// Record one observation of a distribution (durations, sizes, ...)
    fn observe(&self, name: &str, value: f64, labels: Labels<'_>);
}

/// Render `name{k=v,...}`, the key under which `MemoryMetrics` stores a series
pub fn series_key(name: &str, labels: Labels<'_>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}{{{}}}", name, rendered.join(","))
}

/// In-memory metrics store
///
/// Counters are exact. Each observation series keeps only its most recent
/// `sample_capacity` samples.
pub struct MemoryMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
    observations: Mutex<BTreeMap<String, RingBuffer<f64>>>,
    sample_capacity: usize,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::with_sample_capacity(DEFAULT_SAMPLE_CAPACITY)
    }

    pub fn with_sample_capacity(sample_capacity: usize) -> Self {
        Self {
            counters: Mutex::new(BTreeMap::new()),
            observations: Mutex::new(BTreeMap::new()),
            sample_capacity: sample_capacity.max(1),
        }
    }

    /// Value of one labelled counter series
    pub fn counter(&self, name: &str, labels: Labels<'_>) -> u64 {
        let key = series_key(name, labels);
        self.counters
            .lock()
            .map(|counters| counters.get(&key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Sum of a counter across all label sets
    pub fn counter_total(&self, name: &str) -> u64 {
        let prefix = format!("{}{{", name);
        self.counters
            .lock()
            .map(|counters| {
                counters
                    .iter()
                    .filter(|(key, _)| key.as_str() == name || key.starts_with(&prefix))
                    .map(|(_, value)| *value)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Retained samples of one series, oldest first
    pub fn observations(&self, name: &str, labels: Labels<'_>) -> Vec<f64> {
        let key = series_key(name, labels);
        self.observations
            .lock()
            .map(|obs| obs.get(&key).map(RingBuffer::to_vec).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Every counter series, for shutdown summaries
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .lock()
            .map(|counters| counters.clone())
            .unwrap_or_default()
    }
}

impl Default for MemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MemoryMetrics {
    fn increment(&self, name: &str, labels: Labels<'_>) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(series_key(name, labels)).or_insert(0) += 1;
        }
    }

    fn observe(&self, name: &str, value: f64, labels: Labels<'_>) {
        if let Ok(mut obs) = self.observations.lock() {
            let capacity = self.sample_capacity;
            obs.entry(series_key(name, labels))
                .or_insert_with(|| RingBuffer::new(capacity))
                .push(value);
        }
    }
}
