/// Application lifecycle
///
/// `App<S>` owns the configuration and, once started, everything a pipeline
/// run needs: the collaborator bag, the effect registry, the error mapping
/// table and one pipeline template per operation kind. The state parameter
/// makes invalid lifecycle calls unrepresentable.
///
/// # Example
///
/// ```
/// use tenantry_lib::app::App;
/// use tenantry_lib::config::AppConfig;
/// use tenantry_lib::pipeline::{OperationDescriptor, OperationKind, OperationResult};
/// use serde_json::json;
///
/// # fn main() -> tenantry_lib::error::TenantryResult<()> {
/// let app = App::new(AppConfig::default()).start()?;
///
/// let ping = app.operation(OperationDescriptor::new("ping", OperationKind::Service), |_| {
///     Ok(OperationResult::success(json!("pong")))
/// });
/// let outcome = ping.call(json!({}))?;
/// assert_eq!(outcome.result().unwrap().data, json!("pong"));
///
/// let _stopped = app.stop();
/// # Ok(())
/// # }
/// ```
pub mod states;
pub mod transitions;

pub use states::*;

use crate::config::AppConfig;

/// Application with type-safe lifecycle state
#[derive(Debug)]
pub struct App<S> {
    /// Configuration (available in all states)
    pub config: AppConfig,

    /// Current state (type parameter ensures type safety)
    pub state: S,
}

impl<S> App<S> {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenantryError;
    use crate::pipeline::{OperationDescriptor, OperationKind, OperationResult};
    use serde_json::json;

    #[test]
    fn test_start_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.logging.capacity = 0;

        let result = App::new(config).start();
        assert!(matches!(result, Err(TenantryError::ConfigError(_))));
    }

    #[test]
    fn test_configured_error_mapping_is_applied() {
        let mut config = AppConfig::default();
        config.error_mappings.push(crate::config::ErrorMappingEntry {
            kind: "quota-exceeded".to_string(),
            status: 429,
            title: "Too Many Requests".to_string(),
        });
        let app = App::new(config).start().unwrap();

        let op = app.operation(OperationDescriptor::new("limited", OperationKind::Http), |_| {
            Err(crate::error::Failure::new("quota-exceeded", "slow down").into())
        });
        let outcome = op.call(json!({})).unwrap();
        let http = outcome.response().unwrap().as_http().unwrap();

        assert_eq!(http.status, 429);
        assert_eq!(http.body["title"], "Too Many Requests");
    }

    #[test]
    fn test_custom_effect_handler_is_dispatched() {
        let app = App::new(AppConfig::default())
            .with_effect_handler("audit/write", |system, payload| {
                system.logger.info("audit", &payload.to_string());
                Ok(())
            })
            .start()
            .unwrap();

        let op = app.operation(OperationDescriptor::new("audited", OperationKind::Service), |_| {
            Ok(OperationResult::success(json!({}))
                .with_effect(crate::pipeline::Effect::new("audit/write", json!({"who": "ops"}))))
        });
        op.call(json!({})).unwrap();

        assert!(app.logs().iter().any(|entry| entry.source == "audit"));
    }

    #[test]
    fn test_stop_returns_to_stopped() {
        let app = App::new(AppConfig::default()).start().unwrap();
        assert_eq!(app.service_name(), "tenantry");

        let stopped = app.stop();
        let restarted = stopped.start().unwrap();
        assert_eq!(restarted.metrics().counter_total("operation.completed"), 0);
    }
}
