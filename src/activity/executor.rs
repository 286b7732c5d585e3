//! # Activity Executor
//!
//! Runs one configured activity: a fixed pool of worker tasks claims cycle
//! segments from a shared [`CycleAllocator`] and drives each cycle through a
//! [`CycleAction`] until the range is exhausted, a stop is requested, or a
//! fatal error halts the run. The [`OpTracker`] is drained before
//! [`ActivityExecutor::run`] returns.
//!
//! ## Lifecycle
//!
//! ```text
//! Initialized ──run──▶ Running ──exhausted / stop──▶ Stopping ──drain──▶ Stopped
//!                         │
//!                         └──fatal──▶ Errored
//! ```
//!
//! Each worker owns its [`WorkerContext`] and its own binder, created when
//! the worker starts and dropped when it exits.
//!
//! ## Resume point
//!
//! A stop or fatal error can leave claimed cycles unfinished: the rest of a
//! worker's segment, or a cycle abandoned during retry backoff. Workers
//! record the lowest such cycle, and [`ActivitySummary::next_cycle`] is the
//! lower of that and the allocator cursor. Resuming after `next_cycle - 1`
//! never skips a cycle; with several workers it may repeat cycles above
//! `next_cycle` that other workers had already finished.

use super::adapter::{ActivityOps, OpAdapter};
use super::cycle_action::{CycleAction, CycleOutcome};
use super::error_classifier::{ErrorClassifier, StandardErrorClassifier};
use crate::bindings::compiler::BindingFunctionCompiler;
use crate::bindings::context::WorkerContext;
use crate::bindings::registry::MapperRegistry;
use crate::config::ActivityConfig;
use crate::cycles::CycleAllocator;
use crate::error::{ActivityError, ActivityResult, StateMachineError};
use crate::ops::metrics::{MetricsSnapshot, OpMetrics};
use crate::ops::tracker::OpTracker;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    #[default]
    Initialized,
    Running,
    Stopping,
    Stopped,
    Errored,
}

impl ActivityState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
    tracker: Arc<OpTracker>,
}

/// Cloneable stop control for a running activity.
#[derive(Debug, Clone)]
pub struct ActivityHandle {
    signal: Arc<StopSignal>,
}

impl ActivityHandle {
    /// Ask workers to stop after their current cycle. Admission closes
    /// immediately so blocked workers fail fast.
    pub fn stop(&self) {
        if !self.signal.requested.swap(true, Ordering::AcqRel) {
            debug!("Activity stop requested");
        }
        self.signal.tracker.close();
        self.signal.notify.notify_waiters();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.signal.requested.load(Ordering::Acquire)
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        loop {
            let notified = self.signal.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub run_id: Uuid,
    pub alias: String,
    pub state: ActivityState,
    pub cycles_completed: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub cycles_ignored: u64,
    /// Lowest cycle not known to be finished; resume after `next_cycle - 1`
    pub next_cycle: u64,
    pub elapsed: Duration,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerTally {
    succeeded: u64,
    failed: u64,
    ignored: u64,
}

impl WorkerTally {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Succeeded { .. } => self.succeeded += 1,
            CycleOutcome::Failed(_) => self.failed += 1,
            CycleOutcome::Ignored { .. } => self.ignored += 1,
        }
    }

    fn merge(&mut self, other: WorkerTally) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.ignored += other.ignored;
    }

    fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.ignored
    }
}

/// Everything a worker task needs, cloned per worker.
#[derive(Clone)]
struct WorkerShared {
    ops: Arc<ActivityOps>,
    allocator: Arc<CycleAllocator>,
    tracker: Arc<OpTracker>,
    adapter: Arc<dyn OpAdapter>,
    classifier: Arc<dyn ErrorClassifier>,
    handle: ActivityHandle,
    stride: u64,
    unfinished: Arc<AtomicU64>,
}

pub struct ActivityExecutor {
    run_id: Uuid,
    config: ActivityConfig,
    ops: Arc<ActivityOps>,
    allocator: Arc<CycleAllocator>,
    tracker: Arc<OpTracker>,
    metrics: Arc<OpMetrics>,
    adapter: Arc<dyn OpAdapter>,
    classifier: Arc<dyn ErrorClassifier>,
    handle: ActivityHandle,
    /// Lowest claimed cycle left unfinished, `u64::MAX` when none
    unfinished: Arc<AtomicU64>,
    state: RwLock<ActivityState>,
}

impl fmt::Debug for ActivityExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityExecutor")
            .field("run_id", &self.run_id)
            .field("alias", &self.config.alias)
            .field("state", &*self.state.read())
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

impl ActivityExecutor {
    /// Validate `config` and compile every binding and template. Nothing
    /// runs until [`run`](Self::run).
    pub fn new(
        config: ActivityConfig,
        registry: Arc<MapperRegistry>,
        adapter: Arc<dyn OpAdapter>,
    ) -> ActivityResult<Self> {
        config.validate()?;
        let range = config.cycle_range()?;
        let compiler = BindingFunctionCompiler::new(registry);
        let ops = config.compile_ops(&compiler)?;
        let classifier =
            StandardErrorClassifier::with_mapping(config.retry_policy(), config.error_mapping()?);

        let metrics = Arc::new(OpMetrics::new(config.alias.as_str())?);
        let tracker = Arc::new(OpTracker::new(
            config.effective_max_in_flight(),
            Arc::clone(&metrics),
        ));
        let handle = ActivityHandle {
            signal: Arc::new(StopSignal {
                requested: AtomicBool::new(false),
                notify: Notify::new(),
                tracker: Arc::clone(&tracker),
            }),
        };

        info!(
            alias = %config.alias,
            cycles = %range,
            bindings = ops.bindings().len(),
            ops = ops.sequence().ops().len(),
            seq = %ops.sequence().sequencer(),
            adapter = adapter.name(),
            "✅ Activity compiled"
        );

        Ok(Self {
            run_id: Uuid::new_v4(),
            allocator: Arc::new(CycleAllocator::new(range)),
            ops: Arc::new(ops),
            tracker,
            metrics,
            adapter,
            classifier: Arc::new(classifier),
            handle,
            unfinished: Arc::new(AtomicU64::new(u64::MAX)),
            state: RwLock::new(ActivityState::Initialized),
            config,
        })
    }

    /// Replace the standard classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Continue a previous run: the first cycle dispatched is `last_completed + 1`.
    pub fn resume_after(&self, last_completed: u64) -> ActivityResult<()> {
        self.ensure_state(ActivityState::Initialized, "resume")?;
        self.allocator.resume_after(last_completed);
        info!(
            alias = %self.config.alias,
            next_cycle = self.allocator.next_cycle(),
            "Activity resuming"
        );
        Ok(())
    }

    pub fn handle(&self) -> ActivityHandle {
        self.handle.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> ActivityState {
        *self.state.read()
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    pub fn ops(&self) -> &ActivityOps {
        &self.ops
    }

    pub fn metrics(&self) -> &Arc<OpMetrics> {
        &self.metrics
    }

    pub fn tracker(&self) -> &Arc<OpTracker> {
        &self.tracker
    }

    /// Lowest cycle not known to be finished.
    pub fn next_cycle(&self) -> u64 {
        self.unfinished
            .load(Ordering::Acquire)
            .min(self.allocator.next_cycle())
    }

    fn ensure_state(&self, expected: ActivityState, event: &str) -> ActivityResult<()> {
        let current = self.state();
        if current != expected {
            return Err(StateMachineError::InvalidTransition {
                from: current.to_string(),
                event: event.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Run the activity to completion.
    ///
    /// Returns the summary once every worker has exited and the tracker has
    /// drained, or the first activity-fatal error.
    pub async fn run(&self) -> ActivityResult<ActivitySummary> {
        self.ensure_state(ActivityState::Initialized, "run")?;
        *self.state.write() = ActivityState::Running;

        let started = Instant::now();
        info!(
            run_id = %self.run_id,
            alias = %self.config.alias,
            threads = self.config.threads,
            stride = self.config.stride,
            max_in_flight = self.tracker.configured_max_in_flight(),
            first_cycle = self.allocator.next_cycle(),
            "🚀 ACTIVITY_START"
        );

        let shared = WorkerShared {
            ops: Arc::clone(&self.ops),
            allocator: Arc::clone(&self.allocator),
            tracker: Arc::clone(&self.tracker),
            adapter: Arc::clone(&self.adapter),
            classifier: Arc::clone(&self.classifier),
            handle: self.handle.clone(),
            stride: self.config.stride,
            unfinished: Arc::clone(&self.unfinished),
        };
        let workers: Vec<JoinHandle<ActivityResult<WorkerTally>>> = (0..self.config.threads)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, shared.clone())))
            .collect();

        let mut totals = WorkerTally::default();
        let mut first_error: Option<ActivityError> = None;
        for (worker_id, worker) in workers.into_iter().enumerate() {
            let result = worker.await.unwrap_or_else(|join_error| {
                Err(ActivityError::WorkerPanicked {
                    worker: worker_id,
                    reason: join_error.to_string(),
                })
            });
            match result {
                Ok(tally) => totals.merge(tally),
                Err(err) => {
                    self.handle.stop();
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        *self.state.write() = ActivityState::Stopping;
        self.tracker.drain().await;

        let state = if first_error.is_some() {
            ActivityState::Errored
        } else {
            ActivityState::Stopped
        };
        *self.state.write() = state;

        let summary = ActivitySummary {
            run_id: self.run_id,
            alias: self.config.alias.clone(),
            state,
            cycles_completed: totals.completed(),
            cycles_succeeded: totals.succeeded,
            cycles_failed: totals.failed,
            cycles_ignored: totals.ignored,
            next_cycle: self.next_cycle(),
            elapsed: started.elapsed(),
            metrics: self.metrics.snapshot(),
        };

        match first_error {
            Some(err) => {
                error!(
                    run_id = %self.run_id,
                    alias = %self.config.alias,
                    cycles_completed = summary.cycles_completed,
                    next_cycle = summary.next_cycle,
                    error = %err,
                    "❌ ACTIVITY_ERRORED"
                );
                Err(err)
            }
            None => {
                info!(
                    run_id = %self.run_id,
                    alias = %self.config.alias,
                    cycles_completed = summary.cycles_completed,
                    cycles_failed = summary.cycles_failed,
                    next_cycle = summary.next_cycle,
                    stop_requested = self.handle.is_stop_requested(),
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "✅ ACTIVITY_STOPPED"
                );
                Ok(summary)
            }
        }
    }
}

async fn run_worker(worker_id: usize, shared: WorkerShared) -> ActivityResult<WorkerTally> {
    let mut ctx = WorkerContext::new(worker_id);
    let action = CycleAction::new(
        shared.ops.binder()?,
        Arc::clone(&shared.adapter),
        Arc::clone(&shared.tracker),
        Arc::clone(&shared.classifier),
    )
    .with_stop_handle(shared.handle.clone());

    let mut tally = WorkerTally::default();
    debug!(worker_id, "Worker started");

    'claim: while !shared.handle.is_stop_requested() {
        let segment = match shared.allocator.claim_segment(shared.stride) {
            Ok(Some(segment)) => segment,
            Ok(None) => break,
            Err(err) => {
                shared.handle.stop();
                return Err(err);
            }
        };

        for cycle in segment {
            if shared.handle.is_stop_requested() {
                shared.unfinished.fetch_min(cycle, Ordering::AcqRel);
                break 'claim;
            }
            match action.run_cycle(cycle, &mut ctx).await {
                Ok(outcome) => tally.record(&outcome),
                Err(ActivityError::AdmissionClosed) => {
                    debug!(worker_id, cycle, "Admission closed, worker stopping");
                    shared.unfinished.fetch_min(cycle, Ordering::AcqRel);
                    break 'claim;
                }
                Err(err) => {
                    warn!(worker_id, cycle, error = %err, "Worker halting activity");
                    shared.unfinished.fetch_min(cycle, Ordering::AcqRel);
                    shared.handle.stop();
                    return Err(err);
                }
            }
        }
    }

    debug!(worker_id, completed = tally.completed(), "Worker exited");
    Ok(tally)
}
