use super::core::{Phase, PhaseRecord, SharedInterceptor};
use super::response::Response;
use super::result::{EffectError, OperationResult};
use crate::error::{Failure, TenantryError, TenantryResult};
use crate::system::System;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-run timing accumulator
#[derive(Debug, Clone)]
pub struct Timing {
    created_at: DateTime<Utc>,
    started: Option<Instant>,
    total: Option<Duration>,
    phases: Vec<PhaseRecord>,
}

impl Timing {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            started: None,
            total: None,
            phases: Vec::new(),
        }
    }

    /// Start the run clock; later calls keep the first start
    pub fn begin(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    pub(crate) fn finish(&mut self) {
        self.total = Some(self.elapsed());
    }

    /// Time since `begin`, zero if the clock never started
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Total run duration, available once the executor has finished
    pub fn total(&self) -> Option<Duration> {
        self.total
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Every transition the executor invoked, in call order
    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    /// Names of the interceptors that ran `phase`, in call order
    pub fn calls(&self, phase: Phase) -> Vec<&str> {
        self.phases
            .iter()
            .filter(|record| record.phase == phase)
            .map(|record| record.interceptor.as_str())
            .collect()
    }

    pub(crate) fn record(&mut self, record: PhaseRecord) {
        self.phases.push(record);
    }
}

/// The value threaded through one pipeline run
///
/// A context is created fresh for every invocation and never shared between
/// runs, so the execution record and effect errors need no locking.
///
/// # Example
/// ```
/// use tenantry_lib::pipeline::Context;
/// use tenantry_lib::system::System;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let mut ctx = Context::new("inventory.create", json!({"sku": "A-1"}), Arc::new(System::builder().build()));
/// ctx.set_string("tenant", "acme");
///
/// assert_eq!(ctx.operation(), "inventory.create");
/// assert_eq!(ctx.get_string("tenant").unwrap(), "acme");
/// ```
#[derive(Clone)]
pub struct Context {
    operation: String,
    input: Value,
    system: Arc<System>,
    correlation_id: Option<String>,
    timing: Timing,
    result: Option<OperationResult>,
    exception: Option<Failure>,
    halt: bool,
    response: Option<Response>,
    effect_errors: Vec<EffectError>,

    /// Interceptors whose `enter` completed, in entry order
    executed: Vec<SharedInterceptor>,

    /// Free-form values custom interceptors hand to each other
    data: HashMap<String, Value>,
}

impl Context {
    pub fn new(operation: impl Into<String>, input: Value, system: Arc<System>) -> Self {
        Self {
            operation: operation.into(),
            input,
            system,
            correlation_id: None,
            timing: Timing::new(),
            result: None,
            exception: None,
            halt: false,
            response: None,
            effect_errors: Vec::new(),
            executed: Vec::new(),
            data: HashMap::new(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    /// One field of the input, `None` if the input is not an object or lacks it
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.correlation_id = Some(id.into());
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn timing_mut(&mut self) -> &mut Timing {
        &mut self.timing
    }

    pub fn result(&self) -> Option<&OperationResult> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: OperationResult) {
        self.result = Some(result);
    }

    pub fn exception(&self) -> Option<&Failure> {
        self.exception.as_ref()
    }

    pub fn set_exception(&mut self, failure: Failure) {
        self.exception = Some(failure);
    }

    /// Remove the captured failure, switching the rest of the unwind back to `leave`
    pub fn clear_exception(&mut self) -> Option<Failure> {
        self.exception.take()
    }

    pub fn is_halted(&self) -> bool {
        self.halt
    }

    /// Truncate the forward pass without signalling failure
    pub fn halt(&mut self) {
        self.halt = true;
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn effect_errors(&self) -> &[EffectError] {
        &self.effect_errors
    }

    pub fn push_effect_error(&mut self, error: EffectError) {
        self.effect_errors.push(error);
    }

    /// Number of interceptors currently on the execution record
    pub fn executed_len(&self) -> usize {
        self.executed.len()
    }

    pub(crate) fn push_executed(&mut self, interceptor: SharedInterceptor) {
        self.executed.push(interceptor);
    }

    pub(crate) fn pop_executed(&mut self) -> Option<SharedInterceptor> {
        self.executed.pop()
    }

    // ------------------------------------------------------------------------
    // Free-form data
    // ------------------------------------------------------------------------

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value from the context or return an error if not found
    pub fn get_required(&self, key: &str) -> TenantryResult<&Value> {
        self.data
            .get(key)
            .ok_or_else(|| TenantryError::MissingContextKey(key.to_string()))
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), Value::String(value.into()));
    }

    pub fn get_string(&self, key: &str) -> TenantryResult<String> {
        match self.get_required(key)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(TenantryError::Internal(format!(
                "Context key '{}' is not a string",
                key
            ))),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Serializable view of everything a run has observably produced
    pub fn snapshot(&self) -> Value {
        let data: Map<String, Value> = self
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        json!({
            "operation": self.operation,
            "input": self.input,
            "correlation_id": self.correlation_id,
            "result": self.result,
            "exception": self.exception,
            "halt": self.halt,
            "response": self.response,
            "effect_errors": self.effect_errors,
            "data": data,
        })
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let executed: Vec<&str> = self.executed.iter().map(|i| i.name()).collect();
        f.debug_struct("Context")
            .field("operation", &self.operation)
            .field("correlation_id", &self.correlation_id)
            .field("result", &self.result)
            .field("exception", &self.exception)
            .field("halt", &self.halt)
            .field("response", &self.response)
            .field("effect_errors", &self.effect_errors)
            .field("executed", &executed)
            .finish_non_exhaustive()
    }
}
