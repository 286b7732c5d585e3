//! Configuration Loader
//!
//! Environment-aware, layered loading of [`ActivityConfig`]: base file,
//! environment overlay, then prefixed environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::ActivityConfig;
use ::config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base file stem looked up in the config directory.
pub const CONFIG_FILE_STEM: &str = "activity";

/// Prefix for environment variable overrides.
pub const DEFAULT_ENV_PREFIX: &str = "LOADGEN";

const SUPPORTED_EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ActivityConfig,
    environment: String,
    config_directory: Option<PathBuf>,
}

impl ConfigManager {
    /// Load from `./config` with environment auto-detection.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load with an explicit environment name, useful for tests that must not
    /// depend on process-wide variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env_prefix(config_dir, environment, DEFAULT_ENV_PREFIX)
    }

    /// Load with a custom environment-variable prefix.
    pub fn load_with_env_prefix(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_prefix: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));
        let base = Self::find_config_file(&config_directory.join(CONFIG_FILE_STEM))?;

        debug!(
            "Loading activity configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let mut builder = Config::builder().add_source(File::from(base.as_path()));
        if let Ok(overlay) = Self::find_config_file(
            &config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}")),
        ) {
            debug!("Applying environment overlay: {}", overlay.display());
            builder = builder.add_source(File::from(overlay.as_path()));
        }

        let layered = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_failed(config_directory.display().to_string(), e))?;

        let config: ActivityConfig = layered
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_failed(base.display().to_string(), e))?;
        config.validate()?;

        info!(
            environment = environment,
            alias = %config.alias,
            cycles = %config.cycles,
            threads = config.threads,
            bindings = config.bindings.len(),
            "📋 CONFIG: activity configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Some(config_directory),
        }))
    }

    /// Build from an in-memory document. No environment layering is applied.
    pub fn from_str(text: &str, format: FileFormat) -> ConfigResult<Arc<ConfigManager>> {
        let config: ActivityConfig = Config::builder()
            .add_source(File::from_str(text, format))
            .build()?
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_failed("inline configuration", e))?;
        config.validate()?;

        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: None,
        }))
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> Option<&Path> {
        self.config_directory.as_deref()
    }

    /// LOADGEN_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("LOADGEN_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `stem` may itself contain dots (`activity.test`), so extensions are
    /// appended rather than substituted.
    fn find_config_file(stem: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();
        for extension in SUPPORTED_EXTENSIONS {
            let mut candidate = stem.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(extension);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                debug!("Found configuration file: {}", candidate.display());
                return Ok(candidate);
            }
            searched_paths.push(candidate);
        }
        Err(ConfigurationError::config_file_not_found(searched_paths))
    }
}
