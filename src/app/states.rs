/// State type definitions for the application lifecycle
///
/// Each state is a distinct type, so a stopped application cannot compose or
/// run operations and a running one cannot be started twice.
use crate::logger::MemoryLogger;
use crate::pipeline::compose::PipelineTemplate;
use crate::pipeline::interceptors::{EffectRegistry, ErrorMapping};
use crate::system::{MemoryMetrics, MemoryNotifier, MemoryReporter, System};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Stopped state - configuration and effect handlers can still be changed
#[derive(Debug, Clone)]
pub struct Stopped {
    /// Effect handlers the templates will be built with
    pub registry: EffectRegistry,
}

impl Stopped {
    pub fn new() -> Self {
        Self {
            registry: EffectRegistry::standard(),
        }
    }
}

impl Default for Stopped {
    fn default() -> Self {
        Self::new()
    }
}

/// Running state - collaborators and pipeline templates are built
pub struct Running {
    /// When the application was started
    pub started_at: DateTime<Utc>,

    pub system: Arc<System>,

    /// In-memory views of the observability collaborators
    pub logs: Arc<MemoryLogger>,
    pub metrics: Arc<MemoryMetrics>,
    pub reporter: Arc<MemoryReporter>,
    pub notifier: Arc<MemoryNotifier>,

    pub mapping: Arc<ErrorMapping>,
    pub registry: Arc<EffectRegistry>,

    pub http: PipelineTemplate,
    pub cli: PipelineTemplate,
    pub service: PipelineTemplate,
}

impl std::fmt::Debug for Running {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Running")
            .field("started_at", &self.started_at)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
