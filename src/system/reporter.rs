//! Error reporter collaborator

use crate::error::Failure;
use crate::logger::RingBuffer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// Error reporting service reachable through the `System` bag
pub trait ErrorReporter: Send + Sync {
    /// Record a trail marker to attach to later reports of the same run
    ///
    /// A marker without a correlation id belongs to every report.
    fn add_breadcrumb(&self, message: &str, correlation_id: Option<&str>);

    /// Report a failure together with the run's correlation id
    fn report(&self, failure: &Failure, correlation_id: Option<&str>);
}

#[derive(Debug, Clone, Serialize)]
pub struct Breadcrumb {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub message: String,
}

impl Breadcrumb {
    fn belongs_to(&self, correlation_id: Option<&str>) -> bool {
        match self.correlation_id.as_deref() {
            None => true,
            Some(id) => Some(id) == correlation_id,
        }
    }
}

/// A report as captured by `MemoryReporter`
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub failure: Failure,
    pub correlation_id: Option<String>,
    /// The run's breadcrumbs still in the trail at the moment of the report
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// Reporter that keeps a bounded breadcrumb trail and the most recent reports
pub struct MemoryReporter {
    breadcrumbs: Mutex<RingBuffer<Breadcrumb>>,
    reports: Mutex<RingBuffer<Report>>,
}

impl MemoryReporter {
    pub fn new(breadcrumb_capacity: usize, report_capacity: usize) -> Self {
        Self {
            breadcrumbs: Mutex::new(RingBuffer::new(breadcrumb_capacity)),
            reports: Mutex::new(RingBuffer::new(report_capacity)),
        }
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.breadcrumbs
            .lock()
            .map(|crumbs| crumbs.to_vec())
            .unwrap_or_default()
    }

    /// Retained reports, oldest first
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .map(|reports| reports.to_vec())
            .unwrap_or_default()
    }
}

impl Default for MemoryReporter {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

impl ErrorReporter for MemoryReporter {
    fn add_breadcrumb(&self, message: &str, correlation_id: Option<&str>) {
        if let Ok(mut crumbs) = self.breadcrumbs.lock() {
            crumbs.push(Breadcrumb {
                timestamp: Utc::now(),
                correlation_id: correlation_id.map(str::to_string),
                message: message.to_string(),
            });
        }
    }

    fn report(&self, failure: &Failure, correlation_id: Option<&str>) {
        tracing::error!(
            kind = %failure.kind,
            correlation_id = correlation_id.unwrap_or("-"),
            "Reporting failure: {}",
            failure.message
        );

        let breadcrumbs = self
            .breadcrumbs()
            .into_iter()
            .filter(|crumb| crumb.belongs_to(correlation_id))
            .collect();
        let report = Report {
            failure: failure.clone(),
            correlation_id: correlation_id.map(str::to_string),
            breadcrumbs,
        };
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}
