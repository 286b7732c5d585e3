//! # Activity Execution
//!
//! Drives cycles through a pluggable [`OpAdapter`]:
//!
//! - [`adapter`]: the adapter seam and per-cycle op binding
//! - [`sequence`]: ratio-weighted choice of op per cycle
//! - [`error_classifier`]: failure taxonomy, handler mapping, and retry policy
//! - [`cycle_action`]: one cycle from bind to terminal outcome
//! - [`executor`]: the worker pool, stop control, and drain

pub mod adapter;
pub mod cycle_action;
pub mod error_classifier;
pub mod executor;
pub mod sequence;

pub use adapter::{
    ActivityOps, AdapterError, AdapterResult, OpAdapter, OpBinder, OpTemplate, ResolvedOp,
};
pub use cycle_action::{CycleAction, CycleOutcome};
pub use error_classifier::{
    ErrorClassification, ErrorClassifier, ErrorContext, ErrorHandlerEntry, ErrorHandlerMapping,
    HandlerVerb, RetryPolicy, StandardErrorClassifier,
};
pub use executor::{ActivityExecutor, ActivityHandle, ActivityState, ActivitySummary};
pub use sequence::{OpSequence, SequencerType};
