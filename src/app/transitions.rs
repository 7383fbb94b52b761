/// Lifecycle transitions
///
/// Each transition consumes the current application and returns it in the
/// next state.
use super::states::*;
use super::App;
use crate::config::AppConfig;
use crate::error::TenantryResult;
use crate::logger::{LogEntry, Logger, MemoryLogger, TeeLogger, TracingLogger};
use crate::pipeline::compose::{OperationKind, PipelineTemplate};
use crate::pipeline::context::Context;
use crate::pipeline::interceptors::ErrorMapping;
use crate::pipeline::operation::{Operation, OperationDescriptor};
use crate::pipeline::result::OperationResult;
use crate::repository::RepositoryFactory;
use crate::system::{MemoryMetrics, MemoryNotifier, MemoryReporter, System};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Stopped State Transitions
// ============================================================================

impl App<Stopped> {
    /// Create a stopped application with the standard effect handlers
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: Stopped::new(),
        }
    }

    /// Register an effect handler, replacing any handler of the same type
    pub fn with_effect_handler<F>(mut self, effect_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&System, &Value) -> TenantryResult<()> + Send + Sync + 'static,
    {
        self.state.registry.register(effect_type, handler);
        self
    }

    /// Transition to Running state
    ///
    /// Validates the configuration, opens the record store and builds the
    /// collaborators and pipeline templates.
    pub fn start(self) -> TenantryResult<App<Running>> {
        self.config.validate()?;

        let logs = Arc::new(MemoryLogger::new(self.config.logging.capacity));
        logs.set_min_level(self.config.logging.level);
        let metrics = Arc::new(MemoryMetrics::with_sample_capacity(
            self.config.metrics.sample_capacity,
        ));
        let reporter = Arc::new(MemoryReporter::new(
            self.config.reporting.breadcrumb_capacity,
            self.config.reporting.report_capacity,
        ));
        let notifier = Arc::new(MemoryNotifier::new());
        let records = RepositoryFactory::from_config(&self.config.storage)?;

        let loggers: Vec<Arc<dyn Logger>> = vec![Arc::new(TracingLogger), logs.clone()];
        let system = Arc::new(
            System::builder()
                .logger(Arc::new(TeeLogger::new(loggers)))
                .metrics(metrics.clone())
                .reporter(reporter.clone())
                .records(records)
                .notifier(notifier.clone())
                .build(),
        );

        let mut mapping = ErrorMapping::standard();
        mapping.extend_from_config(&self.config.error_mappings);
        let mapping = Arc::new(mapping);
        let registry = Arc::new(self.state.registry);

        tracing::info!(
            service = %self.config.service_name,
            effects = ?registry.types(),
            "Application started"
        );

        Ok(App {
            state: Running {
                started_at: Utc::now(),
                system,
                logs,
                metrics,
                reporter,
                notifier,
                http: PipelineTemplate::http(Arc::clone(&mapping), Arc::clone(&registry)),
                cli: PipelineTemplate::cli(Arc::clone(&mapping), Arc::clone(&registry)),
                service: PipelineTemplate::service(Arc::clone(&registry)),
                mapping,
                registry,
            },
            config: self.config,
        })
    }
}

// ============================================================================
// Running State Transitions
// ============================================================================

impl App<Running> {
    pub fn system(&self) -> &Arc<System> {
        &self.state.system
    }

    /// The shared template for operations of `kind`
    pub fn template(&self, kind: OperationKind) -> &PipelineTemplate {
        match kind {
            OperationKind::Http => &self.state.http,
            OperationKind::Cli => &self.state.cli,
            OperationKind::Service => &self.state.service,
        }
    }

    pub fn error_mapping(&self) -> &ErrorMapping {
        &self.state.mapping
    }

    /// Compose an operation from its descriptor and business function
    pub fn operation<F>(&self, descriptor: OperationDescriptor, business: F) -> Operation
    where
        F: Fn(&Context) -> TenantryResult<OperationResult> + Send + Sync + 'static,
    {
        let template = self.template(descriptor.kind);
        Operation::new(descriptor, template, Arc::clone(&self.state.system), business)
    }

    /// Most recent collaborator log lines
    pub fn logs(&self) -> Vec<LogEntry> {
        self.state.logs.entries()
    }

    pub fn metrics(&self) -> &MemoryMetrics {
        &self.state.metrics
    }

    pub fn reporter(&self) -> &MemoryReporter {
        &self.state.reporter
    }

    pub fn notifier(&self) -> &MemoryNotifier {
        &self.state.notifier
    }

    pub fn uptime(&self) -> Duration {
        (Utc::now() - self.state.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Transition to Stopped state
    pub fn stop(self) -> App<Stopped> {
        let metrics = &self.state.metrics;
        tracing::info!(
            service = %self.config.service_name,
            uptime_ms = self.uptime().as_millis() as u64,
            started = metrics.counter_total("operation.started"),
            completed = metrics.counter_total("operation.completed"),
            failed = metrics.counter_total("operation.failed"),
            effects_failed = metrics.counter_total("effects.failed"),
            "Application stopped"
        );

        App {
            state: Stopped {
                registry: (*self.state.registry).clone(),
            },
            config: self.config,
        }
    }
}
