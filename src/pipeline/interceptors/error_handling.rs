//! Error-handling interceptor group
//!
//! Placed right after the observability-start group so that its `error`
//! handlers run for every failure raised further down the pipeline. The
//! converter comes last in the group: its `error` runs first during unwind,
//! and the logging/metrics/reporting handlers then observe the converted run.

use crate::config::ErrorMappingEntry;
use crate::error::TenantryResult;
use crate::pipeline::context::Context;
use crate::pipeline::core::{Interceptor, Phase};
use crate::pipeline::response::ResponseShaper;
use std::collections::HashMap;
use std::sync::Arc;

const SOURCE: &str = "pipeline::error";

/// Status and title used for failure types with no mapping
pub const DEFAULT_STATUS: u16 = 500;
pub const DEFAULT_TITLE: &str = "Internal Server Error";

/// Maps failure type identifiers to `(status, title)`
#[derive(Debug, Clone, Default)]
pub struct ErrorMapping {
    entries: HashMap<String, (u16, String)>,
}

impl ErrorMapping {
    /// Empty table: everything resolves to the default
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering the built-in domain error types
    pub fn standard() -> Self {
        Self::new()
            .with("validation-error", 400, "Validation Error")
            .with("unauthorized", 401, "Unauthorized")
            .with("forbidden", 403, "Forbidden")
            .with("not-found", 404, "Not Found")
            .with("conflict", 409, "Conflict")
    }

    pub fn with(mut self, kind: impl Into<String>, status: u16, title: impl Into<String>) -> Self {
        self.insert(kind, status, title);
        self
    }

    pub fn insert(&mut self, kind: impl Into<String>, status: u16, title: impl Into<String>) {
        self.entries.insert(kind.into(), (status, title.into()));
    }

    /// Add configured entries, overriding existing ones with the same kind
    pub fn extend_from_config(&mut self, entries: &[ErrorMappingEntry]) {
        for entry in entries {
            self.insert(entry.kind.clone(), entry.status, entry.title.clone());
        }
    }

    pub fn is_mapped(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn resolve(&self, kind: &str) -> (u16, &str) {
        match self.entries.get(kind) {
            Some((status, title)) => (*status, title.as_str()),
            None => (DEFAULT_STATUS, DEFAULT_TITLE),
        }
    }
}

/// Converts the captured failure into a protocol response
pub struct ErrorConverter {
    mapping: Arc<ErrorMapping>,
    shaper: Arc<dyn ResponseShaper>,
}

impl ErrorConverter {
    pub fn new(mapping: Arc<ErrorMapping>, shaper: Arc<dyn ResponseShaper>) -> Self {
        Self { mapping, shaper }
    }
}

impl Interceptor for ErrorConverter {
    fn name(&self) -> &str {
        "error-converter"
    }

    fn error(&self, ctx: &mut Context) -> TenantryResult<()> {
        let Some(failure) = ctx.exception().cloned() else {
            return Ok(());
        };
        let (status, title) = self.mapping.resolve(&failure.kind);
        let response = self
            .shaper
            .shape_failure(&failure, status, title, ctx.correlation_id());
        ctx.set_response(response);
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Error
    }
}

/// Logs every failure at error severity
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorLogging;

impl Interceptor for ErrorLogging {
    fn name(&self) -> &str {
        "error-logging"
    }

    fn error(&self, ctx: &mut Context) -> TenantryResult<()> {
        if let Some(failure) = ctx.exception() {
            ctx.system().logger.error(
                SOURCE,
                &format!(
                    "Operation '{}' failed: {} (correlation: {})",
                    ctx.operation(),
                    failure,
                    ctx.correlation_id().unwrap_or("-")
                ),
            );
        }
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Error
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorMetrics;

impl Interceptor for ErrorMetrics {
    fn name(&self) -> &str {
        "error-metrics"
    }

    fn error(&self, ctx: &mut Context) -> TenantryResult<()> {
        if let Some(failure) = ctx.exception() {
            ctx.system().metrics.increment(
                "operation.failed",
                &[("operation", ctx.operation()), ("kind", failure.kind.as_str())],
            );
        }
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Error
    }
}

/// Leaves a breadcrumb on entry and reports failures
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorReporting;

impl Interceptor for ErrorReporting {
    fn name(&self) -> &str {
        "error-reporting"
    }

    fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
        ctx.system().reporter.add_breadcrumb(
            &format!("operation '{}' started", ctx.operation()),
            ctx.correlation_id(),
        );
        Ok(())
    }

    fn error(&self, ctx: &mut Context) -> TenantryResult<()> {
        if let Some(failure) = ctx.exception() {
            ctx.system()
                .reporter
                .report(failure, ctx.correlation_id());
        }
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        matches!(phase, Phase::Enter | Phase::Error)
    }
}
