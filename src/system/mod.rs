//! Collaborator bag threaded through every pipeline run
//!
//! Observability and effect interceptors reach shared resources only through
//! `System`. Every collaborator is behind an `Arc<dyn Trait>` and must be safe
//! to use from concurrently running pipelines.

pub mod metrics;
pub mod notifier;
pub mod reporter;

pub use metrics::{MemoryMetrics, MetricsSink};
pub use notifier::{MemoryNotifier, Notification, Notifier};
pub use reporter::{ErrorReporter, MemoryReporter};

use crate::logger::{Logger, TracingLogger};
use crate::repository::{MemoryRecordRepository, RecordRepository};
use std::sync::Arc;

/// Shared collaborators: logger, metrics, error reporter, repositories
#[derive(Clone)]
pub struct System {
    pub logger: Arc<dyn Logger>,
    pub metrics: Arc<dyn MetricsSink>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub records: Arc<dyn RecordRepository>,
    pub notifier: Arc<dyn Notifier>,
}

impl System {
    pub fn builder() -> SystemBuilder {
        SystemBuilder::default()
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System").finish_non_exhaustive()
    }
}

/// Builder for `System`; unset collaborators get in-memory defaults
#[derive(Default)]
pub struct SystemBuilder {
    logger: Option<Arc<dyn Logger>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    records: Option<Arc<dyn RecordRepository>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SystemBuilder {
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn records(mut self, records: Arc<dyn RecordRepository>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> System {
        System {
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
            metrics: self
                .metrics
                .unwrap_or_else(|| Arc::new(MemoryMetrics::new())),
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(MemoryReporter::default())),
            records: self
                .records
                .unwrap_or_else(|| Arc::new(MemoryRecordRepository::new())),
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(MemoryNotifier::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLogger;

    #[test]
    fn test_builder_keeps_supplied_collaborators() {
        let logger = Arc::new(MemoryLogger::new(10));
        let system = System::builder().logger(logger.clone()).build();

        system.logger.info("test", "hello");
        assert_eq!(logger.entries().len(), 1);
    }

    #[test]
    fn test_system_is_cheap_to_share() {
        let system = System::builder().build();
        let clone = system.clone();
        assert!(Arc::ptr_eq(&system.records, &clone.records));
    }
}
