//! Interceptor pipeline
//!
//! An operation runs as an ordered chain of interceptors over one mutable
//! `Context`. The forward pass calls `enter` on each interceptor in order; the
//! unwind pass then walks the interceptors that completed `enter` in reverse,
//! calling `leave` or, while a failure is set, `error`. Any transition may
//! throw (return `Err`), halt the forward pass, or set a response.
//!
//! # Example
//! ```
//! use tenantry_lib::pipeline::{Context, FnInterceptor, Phase, Pipeline};
//! use tenantry_lib::system::System;
//! use tenantry_lib::error::TenantryError;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let pipeline = Pipeline::builder("guarded")
//!     .add(FnInterceptor::new("recover").on_error(|ctx| {
//!         ctx.set_string("recovered", "yes");
//!         Ok(())
//!     }))
//!     .add(FnInterceptor::new("guard").on_enter(|_| {
//!         Err(TenantryError::Forbidden("tenant mismatch".to_string()))
//!     }))
//!     .build();
//!
//! let ctx = Context::new("guarded", json!({}), Arc::new(System::builder().build()));
//! let ctx = pipeline.execute(ctx);
//!
//! assert_eq!(ctx.exception().unwrap().kind, "forbidden");
//! assert_eq!(ctx.get_string("recovered").unwrap(), "yes");
//! assert_eq!(ctx.timing().calls(Phase::Error), vec!["recover"]);
//! ```

pub mod compose;
pub mod context;
pub mod core;
pub mod executor;
pub mod interceptors;
pub mod operation;
pub mod response;
pub mod result;

// Re-export main types
pub use compose::{OperationKind, PipelineTemplate};
pub use context::{Context, Timing};
pub use core::{FnInterceptor, Interceptor, Phase, PhaseRecord, SharedInterceptor};
pub use executor::{Pipeline, PipelineBuilder};
pub use operation::{Operation, OperationDescriptor, Outcome};
pub use response::{
    CliResponse, CliShaper, HttpResponse, HttpShaper, Response, ResponseShaper,
    ShaperInterceptor, CORRELATION_HEADER,
};
pub use result::{Effect, EffectError, ErrorDetail, OperationResult, Status};
