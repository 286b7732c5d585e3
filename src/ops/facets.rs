//! Typed op lifecycle.
//!
//! Each lifecycle state is its own type: a [`PendingOp`] can only be admitted,
//! a [`StartedOp`] can only be completed, and completed ops expose their
//! outcome. Transitions consume the previous facet, so an op cannot be
//! completed twice or completed before it was started.

use super::events::OpEvent;
use super::states::{determine_target_state, OpState};
use super::tracker::InFlightSlot;
use crate::error::StateMachineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Identity of one attempt at one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpAttempt {
    pub op_id: Uuid,
    pub cycle: u64,
    /// 1-based attempt number within the cycle.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

/// How a failed op was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Will be retried
    Retryable,
    /// Retry budget spent; the cycle failed
    RetriesExhausted,
    /// Correctness check failed; the cycle failed
    Verification,
    /// Recorded and otherwise ignored
    Ignored,
    /// The activity must halt
    Fatal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Verification => "verification",
            Self::Ignored => "ignored",
            Self::Fatal => "fatal",
        }
    }

    /// Whether this failure ends the cycle.
    pub fn ends_cycle(&self) -> bool {
        !matches!(self, Self::Retryable)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub error_name: String,
    pub message: String,
    /// Whether the error name is tallied in per-error counts
    pub counted: bool,
}

impl FailureCause {
    pub fn new(kind: FailureKind, error_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            error_name: error_name.into(),
            message: message.into(),
            counted: true,
        }
    }

    pub fn with_counted(mut self, counted: bool) -> Self {
        self.counted = counted;
        self
    }
}

/// Result reported when completing a started op.
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutcome {
    Success(serde_json::Value),
    Failure(FailureCause),
}

impl OpOutcome {
    fn event(&self) -> OpEvent {
        match self {
            Self::Success(_) => OpEvent::Succeed,
            Self::Failure(cause) => OpEvent::Fail(cause.message.clone()),
        }
    }
}

/// Created, not yet admitted.
#[derive(Debug, Clone)]
pub struct PendingOp {
    attempt: OpAttempt,
    state: OpState,
}

impl PendingOp {
    pub fn new(cycle: u64, attempt: u32) -> Self {
        Self {
            attempt: OpAttempt {
                op_id: Uuid::new_v4(),
                cycle,
                attempt,
                created_at: Utc::now(),
            },
            state: OpState::Pending,
        }
    }

    pub fn cycle(&self) -> u64 {
        self.attempt.cycle
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.attempt
    }

    pub fn info(&self) -> &OpAttempt {
        &self.attempt
    }

    pub fn state(&self) -> OpState {
        self.state
    }

    pub(crate) fn start(self, slot: InFlightSlot) -> Result<StartedOp, StateMachineError> {
        let state = determine_target_state(self.state, &OpEvent::Start)?;
        Ok(StartedOp {
            attempt: self.attempt,
            state,
            started_at: Instant::now(),
            slot,
        })
    }
}

/// Admitted and executing. Holds one in-flight slot until completed or dropped.
#[derive(Debug)]
pub struct StartedOp {
    attempt: OpAttempt,
    state: OpState,
    started_at: Instant,
    slot: InFlightSlot,
}

impl StartedOp {
    pub fn cycle(&self) -> u64 {
        self.attempt.cycle
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.attempt
    }

    pub fn info(&self) -> &OpAttempt {
        &self.attempt
    }

    pub fn state(&self) -> OpState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Apply the terminal transition. The in-flight slot is released on every path.
    pub(crate) fn finish(self, outcome: OpOutcome) -> Result<CompletedOp, StateMachineError> {
        let StartedOp {
            attempt,
            state,
            started_at,
            slot,
        } = self;
        let duration = started_at.elapsed();
        let target = determine_target_state(state, &outcome.event());
        drop(slot);
        target?;

        Ok(match outcome {
            OpOutcome::Success(result) => CompletedOp::Succeeded(SucceededOp {
                attempt,
                duration,
                result,
            }),
            OpOutcome::Failure(cause) => CompletedOp::Failed(FailedOp {
                attempt,
                duration,
                cause,
            }),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SucceededOp {
    attempt: OpAttempt,
    duration: Duration,
    result: serde_json::Value,
}

impl SucceededOp {
    pub fn cycle(&self) -> u64 {
        self.attempt.cycle
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.attempt
    }

    pub fn info(&self) -> &OpAttempt {
        &self.attempt
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn result(&self) -> &serde_json::Value {
        &self.result
    }

    pub fn state(&self) -> OpState {
        OpState::Succeeded
    }
}

#[derive(Debug, Clone)]
pub struct FailedOp {
    attempt: OpAttempt,
    duration: Duration,
    cause: FailureCause,
}

impl FailedOp {
    pub fn cycle(&self) -> u64 {
        self.attempt.cycle
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.attempt
    }

    pub fn info(&self) -> &OpAttempt {
        &self.attempt
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn cause(&self) -> &FailureCause {
        &self.cause
    }

    pub fn state(&self) -> OpState {
        OpState::Failed
    }
}

/// A terminal op of either outcome.
#[derive(Debug, Clone)]
pub enum CompletedOp {
    Succeeded(SucceededOp),
    Failed(FailedOp),
}

impl CompletedOp {
    pub fn cycle(&self) -> u64 {
        match self {
            Self::Succeeded(op) => op.cycle(),
            Self::Failed(op) => op.cycle(),
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Succeeded(op) => op.duration(),
            Self::Failed(op) => op.duration(),
        }
    }

    pub fn state(&self) -> OpState {
        match self {
            Self::Succeeded(_) => OpState::Succeeded,
            Self::Failed(_) => OpState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}
