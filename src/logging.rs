//! # Structured Logging Module
//!
//! Environment-aware structured logging for activity runs. Output goes to
//! the console; set `LOADGEN_LOG_FORMAT=json` for one JSON object per event.
//! `RUST_LOG` overrides the environment-derived level.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Safe to call more than once, and tolerant
/// of a subscriber installed by someone else.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if json_output_requested() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// LOADGEN_ENV || APP_ENV || 'development'
fn get_environment() -> String {
    std::env::var("LOADGEN_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn json_output_requested() -> bool {
    std::env::var("LOADGEN_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for activity lifecycle operations
pub fn log_activity_operation(
    operation: &str,
    alias: &str,
    state: &str,
    cycles_completed: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        alias = %alias,
        state = %state,
        cycles_completed = cycles_completed,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 ACTIVITY_OPERATION"
    );
}

/// Log structured data for binding compilation
pub fn log_binding_operation(
    operation: &str,
    name: &str,
    recipe: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        name = %name,
        recipe = %recipe,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 BINDING_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
