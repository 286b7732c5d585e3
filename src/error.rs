//! Error types for the load generation core.
//!
//! Errors are flat enums carrying structured fields rather than a class
//! hierarchy. Every error reports an [`ErrorKind`] tag so callers can tell a
//! construction-time rejection, a per-cycle failure, and an activity-halting
//! failure apart without matching on concrete types.

use crate::bindings::types::ValueType;
use crate::config::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Flat classification tag shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed binding recipe
    BindingSyntax,
    /// Recipe names a mapper missing from the registry
    UnknownMapper,
    /// Adjacent chain stages cannot be connected
    TypeMismatch,
    /// Template references fields with no binding
    MissingBinding,
    /// Mapper constructor rejected its arguments
    InvalidArguments,
    /// Cycle space overflowed the maximum representable cycle
    AllocatorExhausted,
    /// A cycle ran out of retry budget
    MaxTriesExhausted,
    /// Adapter read-after-write or correctness check failed
    VerificationFailure,
    /// The whole activity is broken
    FatalActivity,
    /// Admission was refused because the tracker is draining
    AdmissionClosed,
    /// Configuration could not be loaded or validated
    Configuration,
    /// An op was driven through an illegal lifecycle transition
    InvalidTransition,
}

impl ErrorKind {
    /// Raised while compiling bindings or constructing templates, before any cycle runs.
    pub fn is_construction_time(&self) -> bool {
        matches!(
            self,
            Self::BindingSyntax
                | Self::UnknownMapper
                | Self::TypeMismatch
                | Self::MissingBinding
                | Self::InvalidArguments
                | Self::Configuration
        )
    }

    /// Terminal for a single cycle, non-fatal for the activity.
    pub fn is_cycle_scoped(&self) -> bool {
        matches!(self, Self::MaxTriesExhausted | Self::VerificationFailure)
    }

    /// Halts the entire activity.
    pub fn is_activity_fatal(&self) -> bool {
        matches!(
            self,
            Self::FatalActivity | Self::AllocatorExhausted | Self::InvalidTransition
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BindingSyntax => "binding_syntax",
            Self::UnknownMapper => "unknown_mapper",
            Self::TypeMismatch => "type_mismatch",
            Self::MissingBinding => "missing_binding",
            Self::InvalidArguments => "invalid_arguments",
            Self::AllocatorExhausted => "allocator_exhausted",
            Self::MaxTriesExhausted => "max_tries_exhausted",
            Self::VerificationFailure => "verification_failure",
            Self::FatalActivity => "fatal_activity",
            Self::AdmissionClosed => "admission_closed",
            Self::Configuration => "configuration",
            Self::InvalidTransition => "invalid_transition",
        };
        write!(f, "{label}")
    }
}

/// Errors raised while compiling recipes or constructing templates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("Syntax error in recipe '{recipe}' at position {position}: {message}")]
    Syntax {
        recipe: String,
        position: usize,
        message: String,
    },

    #[error("Unknown mapper '{name}' (known mappers: {})", .known.join(", "))]
    UnknownMapper { name: String, known: Vec<String> },

    #[error("Type mismatch in {context}: {from} cannot be used where {to} is expected")]
    TypeMismatch {
        from: ValueType,
        to: ValueType,
        context: String,
    },

    #[error("Template '{template}' references missing bindings: {}", .missing.join(", "))]
    MissingBinding {
        template: String,
        missing: Vec<String>,
    },

    #[error("Invalid arguments for mapper '{mapper}': {reason}")]
    InvalidArguments { mapper: String, reason: String },
}

impl BindingError {
    pub fn syntax(recipe: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            recipe: recipe.into(),
            position,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(mapper: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            mapper: mapper.into(),
            reason: reason.into(),
        }
    }

    pub fn type_mismatch(from: ValueType, to: ValueType, context: impl Into<String>) -> Self {
        Self::TypeMismatch {
            from,
            to,
            context: context.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::BindingSyntax,
            Self::UnknownMapper { .. } => ErrorKind::UnknownMapper,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::MissingBinding { .. } => ErrorKind::MissingBinding,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
        }
    }
}

/// Per-cycle terminal failures. These are recorded, never propagated out of a worker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    #[error("Cycle {cycle} exhausted {tries} tries, last error: {last_error}")]
    MaxTriesExhausted {
        cycle: u64,
        tries: u32,
        last_error: String,
    },

    #[error("Verification failed for cycle {cycle}: expected {expected}, actual {actual} ({detail})")]
    Verification {
        cycle: u64,
        expected: serde_json::Value,
        actual: serde_json::Value,
        detail: String,
    },
}

impl CycleError {
    pub fn cycle(&self) -> u64 {
        match self {
            Self::MaxTriesExhausted { cycle, .. } | Self::Verification { cycle, .. } => *cycle,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MaxTriesExhausted { .. } => ErrorKind::MaxTriesExhausted,
            Self::Verification { .. } => ErrorKind::VerificationFailure,
        }
    }
}

/// Raised by the op lifecycle transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("Invalid op transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },
}

/// Activity-scoped errors.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error(
        "Fatal activity error{}: {reason}",
        .cycle.map(|c| format!(" at cycle {c}")).unwrap_or_default()
    )]
    Fatal { cycle: Option<u64>, reason: String },

    #[error("Cycle allocator exhausted: next cycle {next} is past the maximum representable cycle {max}")]
    AllocatorExhausted { next: u64, max: u64 },

    #[error("Op admission closed: the tracker is draining")]
    AdmissionClosed,

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    InvalidTransition(#[from] StateMachineError),

    #[error("Worker {worker} terminated abnormally: {reason}")]
    WorkerPanicked { worker: usize, reason: String },
}

impl ActivityError {
    pub fn fatal(cycle: Option<u64>, reason: impl Into<String>) -> Self {
        Self::Fatal {
            cycle,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fatal { .. } | Self::WorkerPanicked { .. } => ErrorKind::FatalActivity,
            Self::AllocatorExhausted { .. } => ErrorKind::AllocatorExhausted,
            Self::AdmissionClosed => ErrorKind::AdmissionClosed,
            Self::Binding(err) => err.kind(),
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
        }
    }
}

pub type BindingResult<T> = std::result::Result<T, BindingError>;
pub type ActivityResult<T> = std::result::Result<T, ActivityError>;
