//! Pipeline composition
//!
//! Every operation pipeline has the same shape:
//!
//! ```text
//! [observability-start..., error-handling..., custom..., business,
//!  effects-dispatch, observability-complete..., response-shaper]
//! ```
//!
//! The shared groups are built once into a `PipelineTemplate` per operation
//! kind and concatenated with each operation's own interceptors.

use super::core::SharedInterceptor;
use super::executor::Pipeline;
use super::interceptors::{
    ContextInterceptor, EffectRegistry, EffectsDispatcher, ErrorConverter, ErrorLogging,
    ErrorMapping, ErrorMetrics, ErrorReporting, LoggingComplete, LoggingStart, MetricsComplete,
    MetricsStart,
};
use super::response::{CliShaper, HttpShaper, ResponseShaper, ShaperInterceptor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How an operation is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Http,
    Cli,
    /// Internal call: no response shaping, failures propagate to the caller
    Service,
}

/// `[context, logging-start, metrics-start]`
pub fn observability_start() -> Vec<SharedInterceptor> {
    vec![
        Arc::new(ContextInterceptor),
        Arc::new(LoggingStart),
        Arc::new(MetricsStart),
    ]
}

/// `[error-logging, error-metrics, error-reporting]`
pub fn error_observability() -> Vec<SharedInterceptor> {
    vec![
        Arc::new(ErrorLogging),
        Arc::new(ErrorMetrics),
        Arc::new(ErrorReporting),
    ]
}

/// Error observability followed by the converter for `shaper`'s protocol
pub fn error_handling(
    mapping: Arc<ErrorMapping>,
    shaper: Arc<dyn ResponseShaper>,
) -> Vec<SharedInterceptor> {
    let mut group = error_observability();
    group.push(Arc::new(ErrorConverter::new(mapping, shaper)));
    group
}

/// `[logging-complete, metrics-complete]`
pub fn observability_complete() -> Vec<SharedInterceptor> {
    vec![Arc::new(LoggingComplete), Arc::new(MetricsComplete)]
}

/// Shared interceptor groups for one operation kind
#[derive(Clone)]
pub struct PipelineTemplate {
    kind: OperationKind,
    start: Vec<SharedInterceptor>,
    error_handling: Vec<SharedInterceptor>,
    effects: SharedInterceptor,
    complete: Vec<SharedInterceptor>,
    shaper: Option<SharedInterceptor>,
}

impl PipelineTemplate {
    /// Template whose converter and shaper both render through `shaper`
    pub fn with_shaper(
        kind: OperationKind,
        shaper: Arc<dyn ResponseShaper>,
        mapping: Arc<ErrorMapping>,
        registry: Arc<EffectRegistry>,
    ) -> Self {
        Self {
            kind,
            start: observability_start(),
            error_handling: error_handling(mapping, Arc::clone(&shaper)),
            effects: Arc::new(EffectsDispatcher::new(registry)),
            complete: observability_complete(),
            shaper: Some(Arc::new(ShaperInterceptor::new(shaper))),
        }
    }

    pub fn http(mapping: Arc<ErrorMapping>, registry: Arc<EffectRegistry>) -> Self {
        Self::with_shaper(OperationKind::Http, Arc::new(HttpShaper), mapping, registry)
    }

    pub fn cli(mapping: Arc<ErrorMapping>, registry: Arc<EffectRegistry>) -> Self {
        Self::with_shaper(OperationKind::Cli, Arc::new(CliShaper), mapping, registry)
    }

    /// No converter and no shaper: callers get the raw result or the failure
    pub fn service(registry: Arc<EffectRegistry>) -> Self {
        Self {
            kind: OperationKind::Service,
            start: observability_start(),
            error_handling: error_observability(),
            effects: Arc::new(EffectsDispatcher::new(registry)),
            complete: observability_complete(),
            shaper: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Build the pipeline for one operation
    pub fn assemble(
        &self,
        name: impl Into<String>,
        custom: &[SharedInterceptor],
        business: SharedInterceptor,
    ) -> Pipeline {
        let mut builder = Pipeline::builder(name)
            .extend(&self.start)
            .extend(&self.error_handling)
            .extend(custom)
            .add_shared(business)
            .add_shared(Arc::clone(&self.effects))
            .extend(&self.complete);
        if let Some(shaper) = &self.shaper {
            builder = builder.add_shared(Arc::clone(shaper));
        }
        builder.build()
    }
}

impl std::fmt::Debug for PipelineTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineTemplate")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
