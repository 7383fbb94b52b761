use crate::error::{TenantryError, TenantryResult};
use crate::logger::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable names read by `AppConfig::with_env_overrides`
pub mod env_vars {
    /// Path of the JSON configuration file
    pub const CONFIG_PATH: &str = "TENANTRY_CONFIG";
    pub const SERVICE_NAME: &str = "TENANTRY_SERVICE_NAME";
    pub const LOG_LEVEL: &str = "TENANTRY_LOG_LEVEL";
    pub const STORAGE_PATH: &str = "TENANTRY_STORAGE_PATH";
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Name reported in logs and metrics
    pub service_name: String,

    pub logging: LoggingConfig,

    pub metrics: MetricsConfig,

    pub reporting: ReportingConfig,

    pub storage: StorageConfig,

    /// Extra entries for the error mapping table
    pub error_mappings: Vec<ErrorMappingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level for both `tracing` and the in-memory log
    pub level: LogLevel,

    /// Number of entries the in-memory log retains
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Samples retained per observation series
    pub sample_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportingConfig {
    pub breadcrumb_capacity: usize,

    /// Reports retained by the in-memory reporter
    pub report_capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file backing the record repository; in-memory when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// One row of the error mapping table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorMappingEntry {
    pub kind: String,
    pub status: u16,
    pub title: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "tenantry".to_string(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            reporting: ReportingConfig::default(),
            storage: StorageConfig::default(),
            error_mappings: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            capacity: 1000,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_capacity: 1000,
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            breadcrumb_capacity: 100,
            report_capacity: 100,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> TenantryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TenantryError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            TenantryError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Overlay values from `TENANTRY_*` environment variables
    pub fn with_env_overrides(self) -> TenantryResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> TenantryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(env_vars::SERVICE_NAME) {
            self.service_name = name;
        }
        if let Some(level) = lookup(env_vars::LOG_LEVEL) {
            self.logging.level = LogLevel::parse(&level).ok_or_else(|| {
                TenantryError::ConfigError(format!("Unknown log level: {}", level))
            })?;
        }
        if let Some(path) = lookup(env_vars::STORAGE_PATH) {
            self.storage.path = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    /// Check the configuration for values the application cannot run with
    pub fn validate(&self) -> TenantryResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(TenantryError::ConfigError(
                "service_name must not be empty".to_string(),
            ));
        }
        if self.logging.capacity == 0 {
            return Err(TenantryError::ConfigError(
                "logging.capacity must be greater than zero".to_string(),
            ));
        }
        if self.metrics.sample_capacity == 0 {
            return Err(TenantryError::ConfigError(
                "metrics.sample_capacity must be greater than zero".to_string(),
            ));
        }
        if self.reporting.breadcrumb_capacity == 0 || self.reporting.report_capacity == 0 {
            return Err(TenantryError::ConfigError(
                "reporting capacities must be greater than zero".to_string(),
            ));
        }
        for entry in &self.error_mappings {
            if !(100..=599).contains(&entry.status) {
                return Err(TenantryError::ConfigError(format!(
                    "error mapping '{}' has invalid status {}",
                    entry.kind, entry.status
                )));
            }
        }
        Ok(())
    }
}
