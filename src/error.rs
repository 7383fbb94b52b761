use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field-level validation detail: field name -> human readable problems
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Central error type for Tenantry
#[derive(Error, Debug)]
pub enum TenantryError {
    // ============================================================================
    // Domain Errors
    // ============================================================================
    #[error("Validation failed: {message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ============================================================================
    // Pipeline Errors
    // ============================================================================
    /// A captured failure re-raised to the caller of a pipeline
    #[error("{0}")]
    Failure(Failure),

    #[error("Effect '{effect_type}' failed: {message}")]
    EffectFailed {
        effect_type: String,
        message: String,
    },

    #[error("Required context key not found: {0}")]
    MissingContextKey(String),

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mutex lock error")]
    LockError,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    GenericError(String),
}

impl TenantryError {
    /// Build a validation error from a list of `(field, problem)` pairs
    pub fn validation<I, F, P>(message: impl Into<String>, problems: I) -> Self
    where
        I: IntoIterator<Item = (F, P)>,
        F: Into<String>,
        P: Into<String>,
    {
        let mut fields = FieldErrors::new();
        for (field, problem) in problems {
            fields.entry(field.into()).or_default().push(problem.into());
        }
        TenantryError::Validation {
            message: message.into(),
            fields,
        }
    }

    /// Stable failure type identifier used by the error mapping table
    pub fn kind(&self) -> &str {
        match self {
            TenantryError::Validation { .. } => "validation-error",
            TenantryError::NotFound(_) => "not-found",
            TenantryError::Unauthorized(_) => "unauthorized",
            TenantryError::Forbidden(_) => "forbidden",
            TenantryError::Conflict(_) => "conflict",
            TenantryError::Failure(failure) => &failure.kind,
            TenantryError::EffectFailed { .. } => "effect-error",
            TenantryError::MissingContextKey(_) => "internal-error",
            TenantryError::Repository(_) => "repository-error",
            TenantryError::SerializationError(_) | TenantryError::Json(_) => {
                "serialization-error"
            }
            TenantryError::Io(_) => "io-error",
            TenantryError::LockError => "lock-error",
            TenantryError::ConfigError(_) => "configuration-error",
            TenantryError::Internal(_) | TenantryError::GenericError(_) => "internal-error",
        }
    }
}

/// Structured descriptor of a thrown failure
///
/// This is what a pipeline run keeps in `Context::exception`. Unlike
/// `TenantryError` it is cheap to clone and serializable, so error handlers can
/// inspect it and adapters can re-raise it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure type identifier, e.g. `validation-error`
    #[serde(rename = "type")]
    pub kind: String,

    /// Human readable message
    pub message: String,

    /// Field-level detail for validation-class failures
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: FieldErrors,
}

impl Failure {
    /// Create a failure of an arbitrary type
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    /// Attach field-level detail
    pub fn with_field(mut self, field: impl Into<String>, problem: impl Into<String>) -> Self {
        self.fields.entry(field.into()).or_default().push(problem.into());
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<TenantryError> for Failure {
    fn from(error: TenantryError) -> Self {
        match error {
            TenantryError::Failure(failure) => failure,
            TenantryError::Validation { message, fields } => Failure {
                kind: "validation-error".to_string(),
                message,
                fields,
            },
            other => Failure::new(other.kind(), other.to_string()),
        }
    }
}

impl From<Failure> for TenantryError {
    fn from(failure: Failure) -> Self {
        TenantryError::Failure(failure)
    }
}

// Implement conversion from PoisonError for Mutex locks
impl<T> From<std::sync::PoisonError<T>> for TenantryError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        TenantryError::LockError
    }
}

// Automatic conversion from String (for ad-hoc failures)
impl From<String> for TenantryError {
    fn from(err: String) -> Self {
        TenantryError::GenericError(err)
    }
}

impl From<&str> for TenantryError {
    fn from(err: &str) -> Self {
        TenantryError::GenericError(err.to_string())
    }
}

// Helper type alias for Results
pub type TenantryResult<T> = Result<T, TenantryError>;
