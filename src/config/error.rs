//! Configuration Error Types
//!
//! Errors raised while loading, merging, and validating activity configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Base configuration file not found at the expected location
    #[error("Configuration file not found. Searched paths: {searched_paths:?}")]
    ConfigFileNotFound { searched_paths: Vec<PathBuf> },

    /// Underlying source could not be read or parsed
    #[error("Failed to load configuration from {origin}: {reason}")]
    LoadFailed { origin: String, reason: String },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Cycle range expression could not be parsed or is out of bounds
    #[error("Invalid cycles spec '{spec}': {reason}")]
    InvalidCyclesSpec { spec: String, reason: String },

    /// Error handler mapping could not be parsed
    #[error("Invalid error handler spec '{spec}': {reason}")]
    InvalidErrorSpec { spec: String, reason: String },
}

impl ConfigurationError {
    pub fn config_file_not_found(searched_paths: Vec<PathBuf>) -> Self {
        Self::ConfigFileNotFound { searched_paths }
    }

    pub fn load_failed<O: Into<String>, E: std::fmt::Display>(origin: O, error: E) -> Self {
        Self::LoadFailed {
            origin: origin.into(),
            reason: error.to_string(),
        }
    }

    pub fn missing_required_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    pub fn invalid_cycles_spec<S: Into<String>, R: Into<String>>(spec: S, reason: R) -> Self {
        Self::InvalidCyclesSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_error_spec<S: Into<String>, R: Into<String>>(spec: S, reason: R) -> Self {
        Self::InvalidErrorSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}

impl From<::config::ConfigError> for ConfigurationError {
    fn from(error: ::config::ConfigError) -> Self {
        Self::load_failed("configuration sources", error)
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
