use crate::error::TenantryResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::context::Context;

/// The three transitions an interceptor may take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Enter,
    Leave,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Enter => "enter",
            Phase::Leave => "leave",
            Phase::Error => "error",
        }
    }
}

/// A named, reusable unit wrapping an operation
///
/// Interceptors carry no per-run state: one instance is shared by every
/// pipeline that contains it and by every concurrent run of those pipelines.
/// Returning `Err` from a transition is how an interceptor throws.
///
/// # Example
/// ```
/// use tenantry_lib::pipeline::{Context, Interceptor};
/// use tenantry_lib::error::TenantryResult;
///
/// struct Stamp;
///
/// impl Interceptor for Stamp {
///     fn name(&self) -> &str {
///         "stamp"
///     }
///
///     fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
///         ctx.set_string("stamped", "yes");
///         Ok(())
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync {
    /// Name used in logs and execution traces
    fn name(&self) -> &str;

    /// Forward pass, in pipeline order
    fn enter(&self, _ctx: &mut Context) -> TenantryResult<()> {
        Ok(())
    }

    /// Normal unwind, in reverse pipeline order
    fn leave(&self, _ctx: &mut Context) -> TenantryResult<()> {
        Ok(())
    }

    /// Failure unwind, in reverse pipeline order
    fn error(&self, _ctx: &mut Context) -> TenantryResult<()> {
        Ok(())
    }

    /// Whether this interceptor defines `phase`
    ///
    /// Phases an interceptor does not define are skipped by the executor and
    /// leave no trace record.
    fn handles(&self, _phase: Phase) -> bool {
        true
    }
}

/// Interceptors are shared between pipeline templates and runs
pub type SharedInterceptor = Arc<dyn Interceptor>;

/// Closure form of a single transition
pub type Transition = Arc<dyn Fn(&mut Context) -> TenantryResult<()> + Send + Sync>;

/// Interceptor assembled from optional closures
///
/// ```
/// use tenantry_lib::pipeline::{FnInterceptor, Interceptor};
///
/// let audit = FnInterceptor::new("audit")
///     .on_enter(|ctx| {
///         ctx.set_string("audited", "true");
///         Ok(())
///     })
///     .shared();
/// assert_eq!(audit.name(), "audit");
/// ```
#[derive(Clone)]
pub struct FnInterceptor {
    name: String,
    enter: Option<Transition>,
    leave: Option<Transition>,
    error: Option<Transition>,
}

impl FnInterceptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enter: None,
            leave: None,
            error: None,
        }
    }

    pub fn on_enter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> TenantryResult<()> + Send + Sync + 'static,
    {
        self.enter = Some(Arc::new(f));
        self
    }

    pub fn on_leave<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> TenantryResult<()> + Send + Sync + 'static,
    {
        self.leave = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> TenantryResult<()> + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn shared(self) -> SharedInterceptor {
        Arc::new(self)
    }
}

impl Interceptor for FnInterceptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
        match &self.enter {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn leave(&self, ctx: &mut Context) -> TenantryResult<()> {
        match &self.leave {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn error(&self, ctx: &mut Context) -> TenantryResult<()> {
        match &self.error {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn handles(&self, phase: Phase) -> bool {
        match phase {
            Phase::Enter => self.enter.is_some(),
            Phase::Leave => self.leave.is_some(),
            Phase::Error => self.error.is_some(),
        }
    }
}

/// One transition invocation as recorded by the executor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub interceptor: String,
    pub phase: Phase,
    pub duration: Duration,
    /// Whether the transition returned an error
    pub failed: bool,
}
