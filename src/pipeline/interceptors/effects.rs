//! Effects dispatcher
//!
//! Business logic only *declares* effects in its result. The dispatcher looks
//! each one up by type in an `EffectRegistry` and runs the handler against the
//! run's collaborators. Every handler call is isolated: a failure is recorded
//! in the context's effect errors and the remaining effects still run.

use crate::error::{Failure, TenantryError, TenantryResult};
use crate::pipeline::context::Context;
use crate::pipeline::core::{Interceptor, Phase};
use crate::pipeline::result::EffectError;
use crate::repository::RecordKey;
use crate::system::{Notification, System};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const SOURCE: &str = "pipeline::effects";

/// Standard effect type identifiers
pub mod effect_types {
    pub const RECORD_INSERT: &str = "record/insert";
    pub const RECORD_UPDATE: &str = "record/update";
    pub const RECORD_DELETE: &str = "record/delete";
    pub const NOTIFY_SEND: &str = "notify/send";
}

/// Applies one effect payload against the collaborators
pub type EffectHandler = Arc<dyn Fn(&System, &Value) -> TenantryResult<()> + Send + Sync>;

/// Effect type -> handler
#[derive(Clone, Default)]
pub struct EffectRegistry {
    handlers: HashMap<String, EffectHandler>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the record and notification handlers
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(effect_types::RECORD_INSERT, |system, payload| {
            let payload = RecordPayload::parse(payload)?;
            system.records.insert(&payload.key(), payload.data)?;
            Ok(())
        });
        registry.register(effect_types::RECORD_UPDATE, |system, payload| {
            let payload = RecordPayload::parse(payload)?;
            system.records.update(&payload.key(), payload.data)?;
            Ok(())
        });
        registry.register(effect_types::RECORD_DELETE, |system, payload| {
            let payload = RecordPayload::parse(payload)?;
            system.records.delete(&payload.key())
        });
        registry.register(effect_types::NOTIFY_SEND, |system, payload| {
            let notification: Notification = serde_json::from_value(payload.clone())
                .map_err(|e| TenantryError::SerializationError(format!("notify payload: {}", e)))?;
            system.notifier.send(notification)
        });
        registry
    }

    /// Register (or replace) the handler for `effect_type`
    pub fn register<F>(&mut self, effect_type: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&System, &Value) -> TenantryResult<()> + Send + Sync + 'static,
    {
        self.handlers.insert(effect_type.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, effect_type: &str) -> Option<&EffectHandler> {
        self.handlers.get(effect_type)
    }

    pub fn contains(&self, effect_type: &str) -> bool {
        self.handlers.contains_key(effect_type)
    }

    /// Registered effect types, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("types", &self.types())
            .finish()
    }
}

/// Payload of the `record/*` effects
#[derive(Debug, Deserialize)]
struct RecordPayload {
    tenant: String,
    collection: String,
    id: String,
    #[serde(default)]
    data: Value,
}

impl RecordPayload {
    fn parse(payload: &Value) -> TenantryResult<Self> {
        serde_json::from_value(payload.clone())
            .map_err(|e| TenantryError::SerializationError(format!("record payload: {}", e)))
    }

    fn key(&self) -> RecordKey {
        RecordKey::new(&self.tenant, &self.collection, &self.id)
    }
}

/// Interceptor applying the effects of `ctx.result()`
pub struct EffectsDispatcher {
    registry: Arc<EffectRegistry>,
}

impl EffectsDispatcher {
    pub fn new(registry: Arc<EffectRegistry>) -> Self {
        Self { registry }
    }
}

impl Interceptor for EffectsDispatcher {
    fn name(&self) -> &str {
        "effects-dispatch"
    }

    fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
        let effects = match ctx.result() {
            Some(result) if !result.effects.is_empty() => result.effects.clone(),
            _ => return Ok(()),
        };

        for effect in effects {
            let Some(handler) = self.registry.get(&effect.effect_type) else {
                ctx.system().logger.warn(
                    SOURCE,
                    &format!(
                        "No handler registered for effect '{}' in '{}', skipping",
                        effect.effect_type,
                        ctx.operation()
                    ),
                );
                continue;
            };

            if let Err(error) = handler(ctx.system(), &effect.payload) {
                let failure = Failure::from(error);
                tracing::warn!(
                    effect = %effect.effect_type,
                    operation = %ctx.operation(),
                    kind = %failure.kind,
                    "Effect failed: {}",
                    failure.message
                );
                ctx.push_effect_error(EffectError {
                    effect_type: effect.effect_type,
                    kind: failure.kind,
                    message: failure.message,
                });
            }
        }
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Enter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLogger;
    use crate::pipeline::result::{Effect, OperationResult};
    use crate::system::MemoryNotifier;
    use serde_json::json;
    use std::sync::Mutex;

    fn run_with(registry: EffectRegistry, system: System, effects: Vec<Effect>) -> Context {
        let dispatcher = EffectsDispatcher::new(Arc::new(registry));
        let mut ctx = Context::new("test", json!({}), Arc::new(system));
        ctx.set_result(OperationResult::success(json!({})).with_effects(effects));
        dispatcher.enter(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_failed_effect_does_not_stop_the_rest() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let mut registry = EffectRegistry::new();
        for name in ["a", "c"] {
            let applied = applied.clone();
            registry.register(name, move |_, payload| {
                applied.lock().unwrap().push(payload.clone());
                Ok(())
            });
        }
        registry.register("b", |_, _| Err(TenantryError::Internal("b broke".to_string())));

        let ctx = run_with(
            registry,
            System::builder().build(),
            vec![
                Effect::new("a", json!(1)),
                Effect::new("b", json!(2)),
                Effect::new("c", json!(3)),
            ],
        );

        assert_eq!(*applied.lock().unwrap(), vec![json!(1), json!(3)]);
        assert_eq!(ctx.effect_errors().len(), 1);
        assert_eq!(ctx.effect_errors()[0].effect_type, "b");
        assert!(ctx.exception().is_none());
    }

    #[test]
    fn test_unregistered_effect_is_logged_and_skipped() {
        let logger = Arc::new(MemoryLogger::default());
        let ctx = run_with(
            EffectRegistry::new(),
            System::builder().logger(logger.clone()).build(),
            vec![Effect::new("unknown/type", json!({}))],
        );

        assert!(ctx.effect_errors().is_empty());
        assert_eq!(logger.find("unknown/type").len(), 1);
    }

    #[test]
    fn test_standard_record_and_notify_effects() {
        let notifier = Arc::new(MemoryNotifier::new());
        let system = System::builder().notifier(notifier.clone()).build();
        let records = system.records.clone();

        let ctx = run_with(
            EffectRegistry::standard(),
            system,
            vec![
                Effect::new(
                    effect_types::RECORD_INSERT,
                    json!({"tenant": "acme", "collection": "items", "id": "1", "data": {"q": 1}}),
                ),
                Effect::new(
                    effect_types::NOTIFY_SEND,
                    json!({"channel": "email", "recipient": "ops", "message": "hi"}),
                ),
                Effect::new(
                    effect_types::RECORD_DELETE,
                    json!({"tenant": "acme", "collection": "items", "id": "missing"}),
                ),
            ],
        );

        assert_eq!(records.count("acme", "items").unwrap(), 1);
        assert_eq!(notifier.outbox().len(), 1);
        assert_eq!(ctx.effect_errors().len(), 1);
        assert_eq!(ctx.effect_errors()[0].kind, "not-found");
    }

    #[test]
    fn test_malformed_payload_is_an_effect_error() {
        let ctx = run_with(
            EffectRegistry::standard(),
            System::builder().build(),
            vec![Effect::new(effect_types::RECORD_UPDATE, json!({"tenant": "acme"}))],
        );
        assert_eq!(ctx.effect_errors()[0].kind, "serialization-error");
    }

    #[test]
    fn test_undeliverable_notification_is_an_effect_error() {
        let ctx = run_with(
            EffectRegistry::standard(),
            System::builder().build(),
            vec![Effect::new(
                effect_types::NOTIFY_SEND,
                json!({"channel": "email", "recipient": "", "message": "low stock"}),
            )],
        );
        assert_eq!(ctx.effect_errors()[0].effect_type, "notify/send");
        assert_eq!(ctx.effect_errors()[0].kind, "effect-error");
    }

    #[test]
    fn test_no_result_is_a_noop() {
        let dispatcher = EffectsDispatcher::new(Arc::new(EffectRegistry::standard()));
        let mut ctx = Context::new("test", json!({}), Arc::new(System::builder().build()));
        dispatcher.enter(&mut ctx).unwrap();
        assert!(ctx.effect_errors().is_empty());
    }

    #[test]
    fn test_registry_types() {
        let registry = EffectRegistry::standard();
        assert_eq!(
            registry.types(),
            vec!["notify/send", "record/delete", "record/insert", "record/update"]
        );
        assert!(registry.contains("record/insert"));
    }
}
