use super::context::Context;
use super::core::{Interceptor, Phase, PhaseRecord, SharedInterceptor};
use crate::error::{Failure, TenantryResult};
use std::sync::Arc;
use std::time::Instant;

/// Ordered, immutable sequence of interceptors
///
/// A pipeline holds no per-run state and can be executed concurrently from
/// any number of threads, each run with its own `Context`.
///
/// # Example
/// ```
/// use tenantry_lib::pipeline::{Context, FnInterceptor, Pipeline};
/// use tenantry_lib::system::System;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let pipeline = Pipeline::builder("greet")
///     .add(FnInterceptor::new("hello").on_enter(|ctx| {
///         ctx.set_string("greeting", "hello");
///         Ok(())
///     }))
///     .build();
///
/// let ctx = Context::new("greet", json!({}), Arc::new(System::builder().build()));
/// let ctx = pipeline.execute(ctx);
/// assert_eq!(ctx.get_string("greeting").unwrap(), "hello");
/// ```
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    interceptors: Vec<SharedInterceptor>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Interceptor names in pipeline order
    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn interceptors(&self) -> &[SharedInterceptor] {
        &self.interceptors
    }

    /// Run the pipeline over `ctx` and return the final context
    ///
    /// Forward pass: `enter` in order until an interceptor fails, the context
    /// is halted or the end is reached. Unwind pass: the interceptors that
    /// completed `enter` in reverse order, calling `leave` or, while an
    /// exception is set, `error`. No retries, no timeout: a failure nobody
    /// converts into a response stays in `ctx.exception()` for the caller.
    pub fn execute(&self, mut ctx: Context) -> Context {
        ctx.timing_mut().begin();

        tracing::debug!(
            pipeline = %self.name,
            operation = %ctx.operation(),
            interceptors = self.interceptors.len(),
            "Starting pipeline"
        );

        self.enter_all(&mut ctx);
        self.unwind(&mut ctx);

        ctx.timing_mut().finish();

        tracing::debug!(
            pipeline = %self.name,
            operation = %ctx.operation(),
            failed = ctx.exception().is_some(),
            duration_ms = ctx.timing().elapsed().as_secs_f64() * 1000.0,
            "Pipeline finished"
        );

        ctx
    }

    fn enter_all(&self, ctx: &mut Context) {
        for (index, interceptor) in self.interceptors.iter().enumerate() {
            if ctx.is_halted() {
                tracing::debug!(
                    pipeline = %self.name,
                    remaining = self.interceptors.len() - index,
                    "Context halted, ending forward pass"
                );
                break;
            }
            if ctx.exception().is_some() {
                break;
            }

            if !interceptor.handles(Phase::Enter) {
                ctx.push_executed(Arc::clone(interceptor));
                continue;
            }

            match invoke(interceptor.as_ref(), Phase::Enter, ctx) {
                Ok(()) => ctx.push_executed(Arc::clone(interceptor)),
                Err(failure) => {
                    tracing::debug!(
                        pipeline = %self.name,
                        interceptor = interceptor.name(),
                        kind = %failure.kind,
                        "Enter failed: {}",
                        failure.message
                    );
                    ctx.set_exception(failure);
                    break;
                }
            }
        }
    }

    fn unwind(&self, ctx: &mut Context) {
        while let Some(interceptor) = ctx.pop_executed() {
            let phase = if ctx.exception().is_some() {
                Phase::Error
            } else {
                Phase::Leave
            };

            if !interceptor.handles(phase) {
                continue;
            }

            if let Err(failure) = invoke(interceptor.as_ref(), phase, ctx) {
                tracing::debug!(
                    pipeline = %self.name,
                    interceptor = interceptor.name(),
                    phase = phase.as_str(),
                    kind = %failure.kind,
                    "Unwind transition failed: {}",
                    failure.message
                );
                ctx.set_exception(failure);
            }
        }
    }
}

/// Call one transition and record it in the context's timing accumulator
fn invoke(interceptor: &dyn Interceptor, phase: Phase, ctx: &mut Context) -> Result<(), Failure> {
    let started = Instant::now();
    let outcome: TenantryResult<()> = match phase {
        Phase::Enter => interceptor.enter(ctx),
        Phase::Leave => interceptor.leave(ctx),
        Phase::Error => interceptor.error(ctx),
    };

    ctx.timing_mut().record(PhaseRecord {
        interceptor: interceptor.name().to_string(),
        phase,
        duration: started.elapsed(),
        failed: outcome.is_err(),
    });

    outcome.map_err(Failure::from)
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("interceptors", &self.names())
            .finish()
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    interceptors: Vec<SharedInterceptor>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor
    pub fn add<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Append an interceptor that is shared with other pipelines
    pub fn add_shared(mut self, interceptor: SharedInterceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Append a group of interceptors, keeping their order
    pub fn extend<'a>(mut self, group: impl IntoIterator<Item = &'a SharedInterceptor>) -> Self {
        self.interceptors.extend(group.into_iter().cloned());
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            interceptors: self.interceptors,
        }
    }
}
