//! # Op Error Classification
//!
//! Turns an [`AdapterError`] plus the attempt context into a
//! [`FailureKind`] and a retry decision.
//!
//! ## Overview
//!
//! The adapter declares the broad kind of each failure (retryable,
//! verification, fatal). An optional [`ErrorHandlerMapping`] refines that
//! decision by error name, using the `errors` activity setting:
//!
//! ```text
//! Timeout,Unavailable:retry,warn;Overloaded:ignore,count;.*:stop
//! ```
//!
//! Each `;`-separated entry is `matchers:verbs`. Matchers are anchored regexes
//! over the error name; the first entry whose matcher fits wins. An entry with
//! no matchers applies to every name.
//!
//! ## Decision table
//!
//! | Adapter kind  | Entry verbs       | Outcome                                  |
//! |---------------|-------------------|------------------------------------------|
//! | any           | `stop`            | fatal                                    |
//! | fatal         | any               | fatal                                    |
//! | any           | `ignore`          | ignored                                  |
//! | verification  | otherwise         | verification failure, never retried      |
//! | retryable     | `retry` or none   | retry until `max_tries`, then exhausted  |
//! | retryable     | without `retry`   | exhausted at the current attempt         |
//!
//! ## Usage
//!
//! ```rust
//! use loadgen_core::activity::{
//!     AdapterError, ErrorClassifier, ErrorContext, RetryPolicy, StandardErrorClassifier,
//! };
//! use loadgen_core::ops::FailureKind;
//! use std::time::Duration;
//!
//! let classifier = StandardErrorClassifier::new(RetryPolicy::new(3));
//! let context = ErrorContext {
//!     cycle: 42,
//!     attempt: 1,
//!     elapsed: Duration::from_millis(12),
//! };
//!
//! let error = AdapterError::retryable("Timeout", "read timed out");
//! let classification = classifier.classify(&error, &context);
//! assert_eq!(classification.failure_kind, FailureKind::Retryable);
//! assert!(!classification.is_final_attempt);
//! assert_eq!(classifier.max_tries(), 3);
//! ```

use super::adapter::AdapterError;
use crate::config::error::{ConfigResult, ConfigurationError};
use crate::ops::facets::FailureKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Handler verb in an error mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerVerb {
    Retry,
    Warn,
    Count,
    Ignore,
    Stop,
}

impl HandlerVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Warn => "warn",
            Self::Count => "count",
            Self::Ignore => "ignore",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for HandlerVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(Self::Retry),
            "warn" => Ok(Self::Warn),
            "count" => Ok(Self::Count),
            "ignore" => Ok(Self::Ignore),
            "stop" => Ok(Self::Stop),
            other => Err(format!("unknown error handler '{other}'")),
        }
    }
}

/// One `matchers:verbs` entry.
#[derive(Debug, Clone)]
pub struct ErrorHandlerEntry {
    patterns: Vec<Regex>,
    verbs: Vec<HandlerVerb>,
}

impl ErrorHandlerEntry {
    pub fn matches(&self, error_name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(error_name))
    }

    pub fn has(&self, verb: HandlerVerb) -> bool {
        self.verbs.contains(&verb)
    }

    pub fn verbs(&self) -> &[HandlerVerb] {
        &self.verbs
    }
}

/// Ordered error-name to handler mapping.
#[derive(Debug, Clone, Default)]
pub struct ErrorHandlerMapping {
    entries: Vec<ErrorHandlerEntry>,
}

impl ErrorHandlerMapping {
    /// Parse an `errors` spec. An empty spec yields an empty mapping.
    pub fn parse(spec: &str) -> ConfigResult<Self> {
        let mut entries = Vec::new();

        for raw in spec.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (matchers, verbs) = match raw.rsplit_once(':') {
                Some((matchers, verbs)) => (matchers.trim(), verbs),
                None => ("", raw),
            };

            let verbs = verbs
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| {
                    v.parse::<HandlerVerb>()
                        .map_err(|reason| ConfigurationError::invalid_error_spec(spec, reason))
                })
                .collect::<ConfigResult<Vec<_>>>()?;
            if verbs.is_empty() {
                return Err(ConfigurationError::invalid_error_spec(
                    spec,
                    format!("entry '{raw}' names no handlers"),
                ));
            }

            let sources: Vec<&str> = if matchers.is_empty() {
                vec![".*"]
            } else {
                matchers
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .collect()
            };
            let patterns = sources
                .into_iter()
                .map(|source| {
                    Regex::new(&format!("^(?:{source})$")).map_err(|e| {
                        ConfigurationError::invalid_error_spec(
                            spec,
                            format!("bad matcher '{source}': {e}"),
                        )
                    })
                })
                .collect::<ConfigResult<Vec<_>>>()?;

            entries.push(ErrorHandlerEntry { patterns, verbs });
        }

        Ok(Self { entries })
    }

    /// First entry whose matchers accept `error_name`.
    pub fn resolve(&self, error_name: &str) -> Option<&ErrorHandlerEntry> {
        self.entries.iter().find(|entry| entry.matches(error_name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for ErrorHandlerMapping {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Attempt budget and backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 10,
            retry_delay: Duration::ZERO,
            max_retry_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_tries: u32) -> Self {
        Self {
            max_tries: max_tries.max(1),
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, retry_delay: Duration, max_retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self.max_retry_delay = max_retry_delay;
        self
    }

    /// Backoff before attempt `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.retry_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt);
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_tries
    }
}

/// Where a failed attempt happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext {
    pub cycle: u64,
    /// 1-based attempt that failed
    pub attempt: u32,
    /// Service time of the failed attempt
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorClassification {
    pub failure_kind: FailureKind,
    pub error_name: String,
    pub error_message: String,
    /// Delay before the next attempt; only set for retryable failures
    pub retry_delay: Option<Duration>,
    pub is_final_attempt: bool,
    /// Log the failure at warn level
    pub warn: bool,
    /// Count the failure by name in metrics
    pub count: bool,
}

impl ErrorClassification {
    pub fn is_retryable(&self) -> bool {
        self.failure_kind == FailureKind::Retryable
    }
}

/// Classification strategy seam.
pub trait ErrorClassifier: Send + Sync + fmt::Debug {
    fn classify(&self, error: &AdapterError, context: &ErrorContext) -> ErrorClassification;

    /// Attempt budget per cycle, as applied by [`classify`](Self::classify).
    fn max_tries(&self) -> u32;

    fn classifier_name(&self) -> &'static str;
}

/// Kind-based classifier refined by an optional [`ErrorHandlerMapping`].
#[derive(Debug, Clone, Default)]
pub struct StandardErrorClassifier {
    policy: RetryPolicy,
    mapping: ErrorHandlerMapping,
}

impl StandardErrorClassifier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            mapping: ErrorHandlerMapping::default(),
        }
    }

    pub fn with_mapping(policy: RetryPolicy, mapping: ErrorHandlerMapping) -> Self {
        Self { policy, mapping }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn mapping(&self) -> &ErrorHandlerMapping {
        &self.mapping
    }

    fn decide(&self, error: &AdapterError, entry: Option<&ErrorHandlerEntry>, context: &ErrorContext) -> FailureKind {
        let has = |verb| entry.is_some_and(|e| e.has(verb));

        if has(HandlerVerb::Stop) || matches!(error, AdapterError::Fatal { .. }) {
            return FailureKind::Fatal;
        }
        if has(HandlerVerb::Ignore) {
            return FailureKind::Ignored;
        }
        match error {
            AdapterError::Verification { .. } => FailureKind::Verification,
            _ => {
                let retry_allowed = entry.map_or(true, |e| e.has(HandlerVerb::Retry));
                if retry_allowed && self.policy.has_attempts_left(context.attempt) {
                    FailureKind::Retryable
                } else {
                    FailureKind::RetriesExhausted
                }
            }
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, error: &AdapterError, context: &ErrorContext) -> ErrorClassification {
        let entry = self.mapping.resolve(error.name());
        let failure_kind = self.decide(error, entry, context);

        let retry_delay = (failure_kind == FailureKind::Retryable)
            .then(|| self.policy.delay_before(context.attempt + 1));

        ErrorClassification {
            failure_kind,
            error_name: error.name().to_string(),
            error_message: error.to_string(),
            retry_delay,
            is_final_attempt: failure_kind.ends_cycle(),
            warn: entry.map_or(true, |e| e.has(HandlerVerb::Warn)),
            count: entry.map_or(true, |e| e.has(HandlerVerb::Count)),
        }
    }

    fn max_tries(&self) -> u32 {
        self.policy.max_tries
    }

    fn classifier_name(&self) -> &'static str {
        "StandardErrorClassifier"
    }
}
