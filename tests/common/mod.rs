#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use dashmap::DashMap;
use loadgen_core::activity::{ActivityHandle, AdapterError, AdapterResult, OpAdapter, ResolvedOp};
use loadgen_core::config::ActivityConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

/// What the scripted adapter does for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Succeed,
    /// Retryable failure on every attempt
    AlwaysRetryable(&'static str),
    /// Retryable failure for the first `times` attempts, then success
    FailTimes { times: u32, name: &'static str },
    /// Verification failure with the cycle as expected and `cycle + 1` as actual
    Verify,
    Fatal(&'static str),
    /// Succeed, then stop the activity registered with [`ScriptedAdapter::stop_with`]
    StopActivity,
}

/// Adapter driven by per-cycle behaviors. Records every attempt and the
/// highest concurrency it observed.
#[derive(Debug)]
pub struct ScriptedAdapter {
    default: Behavior,
    per_cycle: HashMap<u64, Behavior>,
    delay: Duration,
    attempts: DashMap<u64, u32>,
    fields: DashMap<u64, Vec<String>>,
    op_names: DashMap<u64, String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    stopper: OnceLock<ActivityHandle>,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self {
            default: Behavior::Succeed,
            per_cycle: HashMap::new(),
            delay: Duration::ZERO,
            attempts: DashMap::new(),
            fields: DashMap::new(),
            op_names: DashMap::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            stopper: OnceLock::new(),
        }
    }

    pub fn with_default(mut self, behavior: Behavior) -> Self {
        self.default = behavior;
        self
    }

    pub fn on_cycle(mut self, cycle: u64, behavior: Behavior) -> Self {
        self.per_cycle.insert(cycle, behavior);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Handle stopped by [`Behavior::StopActivity`].
    pub fn stop_with(&self, handle: ActivityHandle) {
        let _ = self.stopper.set(handle);
    }

    pub fn attempts(&self, cycle: u64) -> u32 {
        self.attempts.get(&cycle).map(|a| *a).unwrap_or(0)
    }

    pub fn cycles_seen(&self) -> Vec<u64> {
        let mut cycles: Vec<u64> = self.attempts.iter().map(|entry| *entry.key()).collect();
        cycles.sort_unstable();
        cycles
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.iter().map(|entry| *entry.value()).sum()
    }

    /// Rendered `stmt` field for every attempt at `cycle`.
    pub fn statements(&self, cycle: u64) -> Vec<String> {
        self.fields
            .get(&cycle)
            .map(|fields| fields.clone())
            .unwrap_or_default()
    }

    /// Name of the op last executed for `cycle`.
    pub fn op_name(&self, cycle: u64) -> Option<String> {
        self.op_names.get(&cycle).map(|name| name.clone())
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, cycle: u64, op: &ResolvedOp) -> AdapterResult {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        let attempt = {
            let mut entry = self.attempts.entry(cycle).or_insert(0);
            *entry += 1;
            *entry
        };
        self.op_names.insert(cycle, op.name.clone());
        if let Some(stmt) = op.field("stmt") {
            self.fields.entry(cycle).or_default().push(stmt.to_string());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behavior = self.per_cycle.get(&cycle).unwrap_or(&self.default);
        let result = match behavior {
            Behavior::Succeed => Ok(serde_json::json!({ "cycle": cycle })),
            Behavior::AlwaysRetryable(name) => Err(AdapterError::retryable(*name, "scripted")),
            Behavior::FailTimes { times, name } if attempt <= *times => {
                Err(AdapterError::retryable(*name, format!("attempt {attempt}")))
            }
            Behavior::FailTimes { .. } => Ok(serde_json::json!({ "cycle": cycle })),
            Behavior::Verify => Err(AdapterError::verification(
                cycle.into(),
                (cycle + 1).into(),
                "off by one",
            )),
            Behavior::Fatal(name) => Err(AdapterError::fatal(*name, "scripted fatal")),
            Behavior::StopActivity => {
                if let Some(handle) = self.stopper.get() {
                    handle.stop();
                }
                Ok(serde_json::json!({ "cycle": cycle }))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Minimal valid activity with one binding rendered into `stmt`.
pub fn activity_config(cycles: &str, threads: usize) -> ActivityConfig {
    let mut config = ActivityConfig {
        alias: "integration".to_string(),
        cycles: cycles.to_string(),
        threads,
        ..ActivityConfig::default()
    };
    config
        .bindings
        .insert("key".to_string(), "Mod(1000)".to_string());
    config
        .templates
        .insert("stmt".to_string(), "select {key}".to_string());
    config
}
