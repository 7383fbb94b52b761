//! Business outcome types: results, declared effects and effect failures

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome class of a business operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    /// Any status the response shapers have no mapping for
    #[serde(untagged)]
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Other(other) => other,
        }
    }
}

/// One declared domain error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A side effect requested by business logic and applied by the effects dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(rename = "type")]
    pub effect_type: String,
    pub payload: Value,
}

impl Effect {
    pub fn new(effect_type: impl Into<String>, payload: Value) -> Self {
        Self {
            effect_type: effect_type.into(),
            payload,
        }
    }
}

/// A failed effect, isolated from the rest of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectError {
    pub effect_type: String,
    /// Failure type identifier of the handler error
    pub kind: String,
    pub message: String,
}

/// Result of a business operation
///
/// Produced once by the business interceptor and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
}

impl OperationResult {
    pub fn success(data: Value) -> Self {
        Self {
            status: Status::Success,
            data,
            errors: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn error(errors: Vec<ErrorDetail>) -> Self {
        Self {
            status: Status::Error,
            data: Value::Null,
            errors,
            effects: Vec::new(),
        }
    }

    pub fn with_status(status: Status, data: Value) -> Self {
        Self {
            status,
            data,
            errors: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_result_serialization() {
        let result = OperationResult::success(json!({"id": 1}))
            .with_effect(Effect::new("notify/send", json!({"to": "ops"})));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["id"], 1);
        assert_eq!(value["effects"][0]["type"], "notify/send");
        assert!(value.get("errors").is_none());
    }

    #[test]
    fn test_error_result() {
        let result = OperationResult::error(vec![
            ErrorDetail::field("name", "is required"),
            ErrorDetail::new("bad input"),
        ]);
        assert!(!result.is_success());
        assert_eq!(result.errors[0].to_string(), "name: is required");
        assert_eq!(result.errors[1].to_string(), "bad input");
    }

    #[test]
    fn test_other_status() {
        let result = OperationResult::with_status(Status::Other("pending".into()), Value::Null);
        assert_eq!(result.status.as_str(), "pending");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "pending");
        let status: Status = serde_json::from_value(json!("queued")).unwrap();
        assert_eq!(status, Status::Other("queued".to_string()));
        let status: Status = serde_json::from_value(json!("error")).unwrap();
        assert_eq!(status, Status::Error);
    }
}
