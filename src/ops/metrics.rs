//! # Op Metrics
//!
//! Per-activity counters and latency histogram, plus OpenTelemetry export.
//!
//! Counters are plain atomics so the hot path stays lock-free; latencies go
//! into an HDR histogram (microseconds, 3 significant figures). The same
//! events are mirrored to OpenTelemetry instruments labelled with the
//! activity alias, which are no-ops until a meter provider is installed.
//!
//! ```rust
//! use loadgen_core::ops::OpMetrics;
//! use std::time::Duration;
//!
//! let metrics = OpMetrics::new("smoke").unwrap();
//! metrics.record_started();
//! metrics.record_succeeded(Duration::from_millis(3));
//! assert_eq!(metrics.snapshot().succeeded, 1);
//! ```

use super::facets::{CompletedOp, FailureKind};
use crate::config::error::ConfigurationError;
use crate::error::ActivityResult;
use dashmap::DashMap;
use hdrhistogram::Histogram as HdrHistogram;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

/// Precision of the latency histogram
pub const LATENCY_SIGNIFICANT_FIGURES: u8 = 3;

/// Latencies above one hour are recorded as one hour
pub const MAX_TRACKED_LATENCY_US: u64 = 3_600_000_000;

/// Lazy-initialized meter for op metrics
static OPS_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    OPS_METER.get_or_init(|| opentelemetry::global::meter_provider().meter("loadgen-ops"))
}

/// Total ops admitted
///
/// Labels:
/// - activity: activity alias
pub fn ops_started_total() -> Counter<u64> {
    meter()
        .u64_counter("loadgen.ops.started.total")
        .with_description("Total number of op attempts admitted")
        .build()
}

/// Total ops completed
///
/// Labels:
/// - activity: activity alias
/// - outcome: succeeded, retryable, retries_exhausted, verification, ignored, fatal
pub fn ops_completed_total() -> Counter<u64> {
    meter()
        .u64_counter("loadgen.ops.completed.total")
        .with_description("Total number of op attempts completed, by outcome")
        .build()
}

/// Op service time in milliseconds
///
/// Labels:
/// - activity: activity alias
pub fn op_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("loadgen.ops.duration")
        .with_description("Op service time from admission to completion")
        .with_unit("ms")
        .build()
}

#[derive(Debug)]
struct Instruments {
    started: Counter<u64>,
    completed: Counter<u64>,
    duration: Histogram<f64>,
}

/// Live counters for one activity.
#[derive(Debug)]
pub struct OpMetrics {
    alias: String,
    started: AtomicU64,
    succeeded: AtomicU64,
    retries: AtomicU64,
    failed_retries_exhausted: AtomicU64,
    failed_verification: AtomicU64,
    failed_fatal: AtomicU64,
    ignored: AtomicU64,
    latencies: Mutex<HdrHistogram<u64>>,
    error_counts: DashMap<String, u64>,
    instruments: Instruments,
}

/// Point-in-time copy of [`OpMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub alias: String,
    pub started: u64,
    pub succeeded: u64,
    pub retries: u64,
    pub failed_retries_exhausted: u64,
    pub failed_verification: u64,
    pub failed_fatal: u64,
    pub ignored: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub latency_max_us: u64,
    pub error_counts: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Completed attempts of any outcome.
    pub fn completed(&self) -> u64 {
        self.succeeded
            + self.retries
            + self.failed_retries_exhausted
            + self.failed_verification
            + self.failed_fatal
            + self.ignored
    }
}

impl OpMetrics {
    pub fn new(alias: impl Into<String>) -> ActivityResult<Self> {
        let latencies = HdrHistogram::new_with_bounds(
            1,
            MAX_TRACKED_LATENCY_US,
            LATENCY_SIGNIFICANT_FIGURES,
        )
        .map_err(|e| {
            ConfigurationError::invalid_value(
                "latency_histogram",
                LATENCY_SIGNIFICANT_FIGURES.to_string(),
                e.to_string(),
            )
        })?;

        Ok(Self {
            alias: alias.into(),
            started: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failed_retries_exhausted: AtomicU64::new(0),
            failed_verification: AtomicU64::new(0),
            failed_fatal: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            latencies: Mutex::new(latencies),
            error_counts: DashMap::new(),
            instruments: Instruments {
                started: ops_started_total(),
                completed: ops_completed_total(),
                duration: op_duration(),
            },
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.instruments
            .started
            .add(1, &[KeyValue::new("activity", self.alias.clone())]);
    }

    pub fn record_succeeded(&self, duration: Duration) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.record_completion("succeeded", duration);
    }

    pub fn record_failed(&self, kind: FailureKind, error_name: &str, duration: Duration) {
        self.record_failure(kind, Some(error_name), duration);
    }

    fn record_failure(&self, kind: FailureKind, error_name: Option<&str>, duration: Duration) {
        let counter = match kind {
            FailureKind::Retryable => &self.retries,
            FailureKind::RetriesExhausted => &self.failed_retries_exhausted,
            FailureKind::Verification => &self.failed_verification,
            FailureKind::Fatal => &self.failed_fatal,
            FailureKind::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(name) = error_name {
            *self.error_counts.entry(name.to_string()).or_insert(0) += 1;
        }
        self.record_completion(kind.as_str(), duration);
    }

    /// Record a completed op according to its outcome.
    pub fn record(&self, op: &CompletedOp) {
        match op {
            CompletedOp::Succeeded(op) => self.record_succeeded(op.duration()),
            CompletedOp::Failed(op) => {
                let cause = op.cause();
                let name = cause.counted.then_some(cause.error_name.as_str());
                self.record_failure(cause.kind, name, op.duration())
            }
        }
    }

    fn record_completion(&self, outcome: &'static str, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.latencies.lock().saturating_record(micros.max(1));

        let labels = [
            KeyValue::new("activity", self.alias.clone()),
            KeyValue::new("outcome", outcome),
        ];
        self.instruments.completed.add(1, &labels);
        self.instruments
            .duration
            .record(duration.as_secs_f64() * 1_000.0, &labels[..1]);
    }

    pub fn error_count(&self, error_name: &str) -> u64 {
        self.error_counts
            .get(error_name)
            .map(|count| *count)
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (p50, p95, p99, max) = {
            let latencies = self.latencies.lock();
            if latencies.is_empty() {
                (0, 0, 0, 0)
            } else {
                (
                    latencies.value_at_quantile(0.50),
                    latencies.value_at_quantile(0.95),
                    latencies.value_at_quantile(0.99),
                    latencies.max(),
                )
            }
        };

        MetricsSnapshot {
            alias: self.alias.clone(),
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failed_retries_exhausted: self.failed_retries_exhausted.load(Ordering::Relaxed),
            failed_verification: self.failed_verification.load(Ordering::Relaxed),
            failed_fatal: self.failed_fatal.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
            latency_max_us: max,
            error_counts: self
                .error_counts
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }
}
