use super::compose::{OperationKind, PipelineTemplate};
use super::context::Context;
use super::core::SharedInterceptor;
use super::executor::Pipeline;
use super::interceptors::BusinessInterceptor;
use super::response::Response;
use super::result::OperationResult;
use crate::error::{TenantryError, TenantryResult};
use crate::system::System;
use serde_json::Value;
use std::sync::Arc;

/// Name, kind and custom interceptors of one operation
#[derive(Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub kind: OperationKind,
    pub interceptors: Vec<SharedInterceptor>,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            interceptors: Vec::new(),
        }
    }

    /// Append a custom interceptor; these run after the error-handling group
    /// and before the business interceptor
    pub fn with_interceptor(mut self, interceptor: SharedInterceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }
}

impl std::fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("interceptors", &names)
            .finish()
    }
}

/// What a finished run hands back to its caller
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A shaped protocol response (http and cli operations)
    Response(Response),
    /// The raw business result (service operations)
    Result(OperationResult),
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Response(response) => Some(response),
            Outcome::Result(_) => None,
        }
    }

    pub fn result(&self) -> Option<&OperationResult> {
        match self {
            Outcome::Result(result) => Some(result),
            Outcome::Response(_) => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Outcome::Response(response) => Some(response),
            Outcome::Result(_) => None,
        }
    }
}

/// A composed, runnable operation
///
/// Holds its pipeline and the collaborators every run is bound to. Cheap to
/// share behind an `Arc`; runs never mutate it.
pub struct Operation {
    name: String,
    kind: OperationKind,
    pipeline: Pipeline,
    system: Arc<System>,
}

impl Operation {
    pub fn new<F>(
        descriptor: OperationDescriptor,
        template: &PipelineTemplate,
        system: Arc<System>,
        business: F,
    ) -> Self
    where
        F: Fn(&Context) -> TenantryResult<OperationResult> + Send + Sync + 'static,
    {
        let business: SharedInterceptor =
            Arc::new(BusinessInterceptor::new(descriptor.name.clone(), business));
        let pipeline = template.assemble(
            descriptor.name.clone(),
            &descriptor.interceptors,
            business,
        );

        let kind = template.kind();
        if descriptor.kind != kind {
            tracing::warn!(
                operation = %descriptor.name,
                requested = ?descriptor.kind,
                template = ?kind,
                "Operation composed on a template of another kind"
            );
        }

        tracing::debug!(
            operation = %descriptor.name,
            kind = ?kind,
            interceptors = pipeline.len(),
            "Composed operation"
        );

        Self {
            name: descriptor.name,
            kind,
            pipeline,
            system,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of the template the pipeline was assembled from
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Fresh context for one run of this operation
    pub fn context(&self, input: Value) -> Context {
        Context::new(self.name.clone(), input, Arc::clone(&self.system))
    }

    /// Execute one run and resolve what the caller gets
    ///
    /// A response wins over everything else. Without one, an unhandled
    /// failure is returned as an error, then the raw result.
    pub fn run(&self, ctx: Context) -> TenantryResult<Outcome> {
        let mut ctx = self.pipeline.execute(ctx);

        if let Some(response) = ctx.response().cloned() {
            return Ok(Outcome::Response(response));
        }
        if let Some(failure) = ctx.clear_exception() {
            return Err(TenantryError::Failure(failure));
        }
        match ctx.result() {
            Some(result) => Ok(Outcome::Result(result.clone())),
            None => Err(TenantryError::Internal(format!(
                "Operation '{}' produced neither a response nor a result",
                self.name
            ))),
        }
    }

    /// `run` over a fresh context built from `input`
    pub fn call(&self, input: Value) -> TenantryResult<Outcome> {
        self.run(self.context(input))
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
