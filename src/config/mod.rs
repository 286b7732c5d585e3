//! # Activity Configuration
//!
//! Read-only description of one activity run: which cycles to execute, how
//! many workers and in-flight ops to allow, how to retry, and the binding
//! recipes and op field templates to compile.
//!
//! A single-op activity lists its fields under `templates`. Several ops go
//! under `ops`, each with a `ratio` (default 1) and its own `fields`; the
//! `seq` setting (`bucket`, `concat`, `interval`) orders them per cycle.
//! All ops share the top-level `bindings`.
//!
//! ## Sources
//!
//! [`ConfigManager`] layers, lowest to highest precedence:
//!
//! - `activity.{yaml,toml,json}` in the config directory
//! - `activity.<environment>.{yaml,toml,json}` overlay, when present
//! - `LOADGEN__*` environment variables (`LOADGEN__THREADS=8`)
//!
//! ## Usage
//!
//! ```rust
//! use loadgen_core::config::{ActivityConfig, ConfigManager};
//! use config::FileFormat;
//!
//! let manager = ConfigManager::from_str(
//!     r#"
//! alias: smoke
//! cycles: "1K"
//! threads: 4
//! bindings:
//!   id: "Mod(100)"
//! templates:
//!   stmt: "select {id}"
//! "#,
//!     FileFormat::Yaml,
//! )
//! .unwrap();
//!
//! let config: &ActivityConfig = manager.config();
//! assert_eq!(config.cycle_range().unwrap().len(), Some(1_000));
//! assert_eq!(config.effective_max_in_flight(), 4);
//! ```

pub mod error;
pub mod loader;

use crate::activity::adapter::ActivityOps;
use crate::activity::error_classifier::{ErrorHandlerMapping, RetryPolicy};
use crate::activity::sequence::SequencerType;
use crate::bindings::compiler::BindingFunctionCompiler;
use crate::cycles::CycleRange;
use crate::error::ActivityResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// One named op in a multi-op activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpConfig {
    /// Table slots per sequence; 0 disables the op
    pub ratio: u64,
    /// Field name to template string
    pub fields: IndexMap<String, String>,
}

impl Default for OpConfig {
    fn default() -> Self {
        Self {
            ratio: 1,
            fields: IndexMap::new(),
        }
    }
}

/// One activity's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Name used in logs and metric labels
    pub alias: String,
    /// Cycles spec: `N`, `A..B`, `A..`, with optional K/M/B suffixes
    pub cycles: String,
    /// Concurrent worker tasks
    pub threads: usize,
    /// Cycles claimed per allocation
    pub stride: u64,
    /// Admission ceiling; defaults to `threads`
    pub max_in_flight: Option<usize>,
    /// Attempts per cycle, including the first
    pub max_tries: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    /// Error handler mapping, `matchers:verbs;...`
    pub errors: String,
    /// Binding name to recipe
    pub bindings: IndexMap<String, String>,
    /// Op field name to template string, for a single op named by `alias`
    pub templates: IndexMap<String, String>,
    /// Named ops with ratios; excludes `templates`
    pub ops: IndexMap<String, OpConfig>,
    /// Op ordering within one sequence
    pub seq: SequencerType,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            alias: "unnamed".to_string(),
            cycles: "0".to_string(),
            threads: 1,
            stride: 1,
            max_in_flight: None,
            max_tries: 10,
            retry_delay_ms: 0,
            max_retry_delay_ms: 500,
            errors: String::new(),
            bindings: IndexMap::new(),
            templates: IndexMap::new(),
            ops: IndexMap::new(),
            seq: SequencerType::default(),
        }
    }
}

impl ActivityConfig {
    /// Check every field that can be checked without compiling bindings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.alias.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "alias",
                "activity configuration",
            ));
        }
        if self.threads == 0 {
            return Err(ConfigurationError::invalid_value(
                "threads",
                "0",
                "at least one worker is required",
            ));
        }
        if self.stride == 0 {
            return Err(ConfigurationError::invalid_value(
                "stride",
                "0",
                "stride must be positive",
            ));
        }
        if self.max_in_flight == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "max_in_flight",
                "0",
                "admission ceiling must be positive",
            ));
        }
        if self.max_tries == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_tries",
                "0",
                "every cycle needs at least one attempt",
            ));
        }
        if self.max_retry_delay_ms < self.retry_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "max_retry_delay_ms",
                self.max_retry_delay_ms.to_string(),
                format!("must be at least retry_delay_ms ({})", self.retry_delay_ms),
            ));
        }
        if !self.ops.is_empty() && !self.templates.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "templates",
                self.templates.keys().cloned().collect::<Vec<_>>().join(","),
                "set either templates or ops, not both",
            ));
        }
        if !self.ops.is_empty() && self.ops.values().all(|op| op.ratio == 0) {
            return Err(ConfigurationError::invalid_value(
                "ops",
                self.ops.keys().cloned().collect::<Vec<_>>().join(","),
                "at least one op needs a positive ratio",
            ));
        }
        self.cycle_range()?;
        self.error_mapping()?;
        Ok(())
    }

    /// `(name, ratio, fields)` per op. Without `ops`, one op named by the
    /// alias carries `templates`.
    pub fn op_specs(&self) -> Vec<(&str, u64, &IndexMap<String, String>)> {
        if self.ops.is_empty() {
            return vec![(self.alias.as_str(), 1, &self.templates)];
        }
        self.ops
            .iter()
            .map(|(name, op)| (name.as_str(), op.ratio, &op.fields))
            .collect()
    }

    /// Compile the bindings and sequence every op.
    pub fn compile_ops(&self, compiler: &BindingFunctionCompiler) -> ActivityResult<ActivityOps> {
        ActivityOps::compile(compiler, self.bindings.iter(), self.op_specs(), self.seq)
    }

    pub fn cycle_range(&self) -> ConfigResult<CycleRange> {
        CycleRange::parse(&self.cycles)
    }

    pub fn effective_max_in_flight(&self) -> usize {
        self.max_in_flight.unwrap_or(self.threads).max(1)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_tries).with_delays(
            Duration::from_millis(self.retry_delay_ms),
            Duration::from_millis(self.max_retry_delay_ms),
        )
    }

    pub fn error_mapping(&self) -> ConfigResult<ErrorHandlerMapping> {
        ErrorHandlerMapping::parse(&self.errors)
    }
}
