//! TOML configuration primitives for the planner binary.
//!
//! `otg_planner::config::PlannerConfig` embeds [`SharedConfig`] as its
//! `[shared]` table and is read through [`ConfigLoader`]. The configured
//! [`LogLevel`] seeds the tracing filter unless `--verbose` or `RUST_LOG`
//! says otherwise.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Why a planner configuration could not be loaded.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found")]
    FileNotFound,

    /// Unreadable file, bad TOML, or a table that does not fit the type.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Limits, cycle time or axis table rejected by `validate`.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// `[shared] log_level`, written in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// The `[shared]` table.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "otg-planner-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Name carried in the startup log line.
    pub service_name: String,
}

impl SharedConfig {
    /// Rejects an empty `service_name`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads any deserializable configuration from a TOML file or string.
///
/// A missing file maps to [`ConfigError::FileNotFound`]; every other read or
/// parse failure maps to [`ConfigError::ParseError`].
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
