use crate::config::LoggingConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Log level enum for type-safe logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// A single captured log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
}

/// Fixed-capacity buffer that overwrites its oldest entry when full
pub(crate) struct RingBuffer<T> {
    buffer: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(item);
        } else {
            self.buffer[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Items in insertion order, oldest first
    pub(crate) fn to_vec(&self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.buffer.len());
        result.extend_from_slice(&self.buffer[self.head..]);
        result.extend_from_slice(&self.buffer[..self.head]);
        result
    }

    pub(crate) fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
    }
}

/// Logger collaborator reachable through the `System` bag
///
/// Implementations must be safe to share across concurrently running
/// pipelines.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, source: &str, message: &str);

    fn info(&self, source: &str, message: &str) {
        self.log(LogLevel::Info, source, message);
    }

    fn warn(&self, source: &str, message: &str) {
        self.log(LogLevel::Warn, source, message);
    }

    fn error(&self, source: &str, message: &str) {
        self.log(LogLevel::Error, source, message);
    }
}

/// Logger that forwards every line to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, source: &str, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(source, "{}", message),
            LogLevel::Info => tracing::info!(source, "{}", message),
            LogLevel::Warn => tracing::warn!(source, "{}", message),
            LogLevel::Error => tracing::error!(source, "{}", message),
        }
    }
}

/// Logger that hands every line to each of its inner loggers
pub struct TeeLogger {
    loggers: Vec<Arc<dyn Logger>>,
}

impl TeeLogger {
    pub fn new(loggers: Vec<Arc<dyn Logger>>) -> Self {
        Self { loggers }
    }
}

impl Logger for TeeLogger {
    fn log(&self, level: LogLevel, source: &str, message: &str) {
        for logger in &self.loggers {
            logger.log(level, source, message);
        }
    }
}

/// In-memory logger keeping the most recent entries
pub struct MemoryLogger {
    entries: Mutex<RingBuffer<LogEntry>>,
    min_level: AtomicU8,
}

impl MemoryLogger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(RingBuffer::new(capacity)),
            min_level: AtomicU8::new(LogLevel::Debug as u8),
        }
    }

    /// Set minimum log level (runtime filtering)
    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.to_vec(),
            Err(_) => Vec::new(),
        }
    }

    /// Entries whose message contains `needle`
    pub fn find(&self, needle: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.message.contains(needle))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, source: &str, message: &str) {
        if (level as u8) < self.min_level.load(Ordering::Relaxed) {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            source: source.to_string(),
        };

        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Install the process-wide `tracing` subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once keeps the first subscriber.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
