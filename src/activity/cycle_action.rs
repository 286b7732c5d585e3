//! Per-cycle unit of work.
//!
//! A [`CycleAction`] runs one cycle to a terminal outcome: bind, admit,
//! execute, classify, complete, and retry with freshly resolved bindings
//! while the classifier allows it. Per-cycle failures come back as
//! [`CycleOutcome::Failed`]; only activity-fatal conditions are errors.

use super::adapter::{AdapterError, OpAdapter, OpBinder};
use super::error_classifier::{ErrorClassification, ErrorClassifier, ErrorContext};
use super::executor::ActivityHandle;
use crate::bindings::context::WorkerContext;
use crate::error::{ActivityError, ActivityResult, CycleError};
use crate::ops::facets::{FailureCause, FailureKind, OpOutcome, PendingOp};
use crate::ops::tracker::OpTracker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Terminal result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Succeeded { tries: u32 },
    Failed(CycleError),
    Ignored { tries: u32, error_name: String },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

pub struct CycleAction {
    binder: OpBinder,
    adapter: Arc<dyn OpAdapter>,
    tracker: Arc<OpTracker>,
    classifier: Arc<dyn ErrorClassifier>,
    stop: Option<ActivityHandle>,
}

impl std::fmt::Debug for CycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleAction")
            .field("adapter", &self.adapter.name())
            .field("classifier", &self.classifier.classifier_name())
            .field("max_tries", &self.classifier.max_tries())
            .finish()
    }
}

impl CycleAction {
    pub fn new(
        binder: OpBinder,
        adapter: Arc<dyn OpAdapter>,
        tracker: Arc<OpTracker>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        Self {
            binder,
            adapter,
            tracker,
            classifier,
            stop: None,
        }
    }

    /// Let a stop request cut short the backoff between attempts.
    pub fn with_stop_handle(mut self, handle: ActivityHandle) -> Self {
        self.stop = Some(handle);
        self
    }

    /// Run `cycle` until it succeeds, fails terminally, or is ignored.
    ///
    /// Returns `Err` only for conditions that end the activity: a fatal
    /// classification, closed admission, or an illegal op transition.
    pub async fn run_cycle(&self, cycle: u64, ctx: &mut WorkerContext) -> ActivityResult<CycleOutcome> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let op = self.binder.bind(cycle, ctx);
            let started = self.tracker.admit(PendingOp::new(cycle, attempt)).await?;

            let error = match self.adapter.execute(cycle, &op).await {
                Ok(payload) => {
                    self.tracker.complete(started, OpOutcome::Success(payload))?;
                    trace!(cycle, attempt, "Cycle succeeded");
                    return Ok(CycleOutcome::Succeeded { tries: attempt });
                }
                Err(error) => error,
            };

            let context = ErrorContext {
                cycle,
                attempt,
                elapsed: started.elapsed(),
            };
            let classification = self.classifier.classify(&error, &context);
            let cause = FailureCause::new(
                classification.failure_kind,
                classification.error_name.as_str(),
                classification.error_message.as_str(),
            )
            .with_counted(classification.count);
            self.tracker.complete(started, OpOutcome::Failure(cause))?;
            self.log_failure(&context, &classification);

            match classification.failure_kind {
                FailureKind::Retryable => {
                    let delay = classification.retry_delay.unwrap_or_default();
                    if !self.backoff(delay).await {
                        return Err(ActivityError::AdmissionClosed);
                    }
                }
                FailureKind::Ignored => {
                    return Ok(CycleOutcome::Ignored {
                        tries: attempt,
                        error_name: classification.error_name,
                    });
                }
                FailureKind::Fatal => {
                    error!(
                        cycle,
                        attempt,
                        error = %classification.error_message,
                        "❌ ACTIVITY_FATAL: halting activity"
                    );
                    return Err(ActivityError::fatal(Some(cycle), classification.error_message));
                }
                FailureKind::Verification | FailureKind::RetriesExhausted => {
                    return Ok(CycleOutcome::Failed(cycle_error(cycle, attempt, error)));
                }
            }
        }
    }

    /// Sleep before the next attempt. Returns `false` when a stop arrived first.
    async fn backoff(&self, delay: Duration) -> bool {
        match &self.stop {
            Some(handle) if handle.is_stop_requested() => false,
            Some(handle) if !delay.is_zero() => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => true,
                    _ = handle.stopped() => false,
                }
            }
            _ => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                true
            }
        }
    }

    fn log_failure(&self, context: &ErrorContext, classification: &ErrorClassification) {
        let kind = classification.failure_kind;
        if classification.warn {
            warn!(
                cycle = context.cycle,
                attempt = context.attempt,
                max_tries = self.classifier.max_tries(),
                error_name = %classification.error_name,
                failure = %kind,
                delay_ms = classification.retry_delay.map(|d| d.as_millis() as u64),
                "⚠️ OP_FAILED: {}",
                classification.error_message
            );
        } else {
            debug!(
                cycle = context.cycle,
                attempt = context.attempt,
                error_name = %classification.error_name,
                failure = %kind,
                "Op failed"
            );
        }
    }
}

fn cycle_error(cycle: u64, tries: u32, error: AdapterError) -> CycleError {
    match error {
        AdapterError::Verification {
            expected,
            actual,
            detail,
        } => CycleError::Verification {
            cycle,
            expected,
            actual,
            detail,
        },
        other => CycleError::MaxTriesExhausted {
            cycle,
            tries,
            last_error: other.to_string(),
        },
    }
}
