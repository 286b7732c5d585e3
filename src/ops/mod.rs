//! # Op Lifecycle
//!
//! Every unit of work an activity sends to its adapter is an op attempt. An
//! attempt moves `Pending -> Started -> Succeeded | Failed`; each state is a
//! distinct facet type in [`facets`], and the same table is available at
//! runtime through [`states::determine_target_state`].
//!
//! [`OpTracker`] owns admission: it bounds how many ops are started at once
//! and can drain in-flight work before shutdown. [`OpMetrics`] counts
//! outcomes and latencies for the activity.

pub mod events;
pub mod facets;
pub mod metrics;
pub mod states;
pub mod tracker;

pub use events::OpEvent;
pub use facets::{
    CompletedOp, FailedOp, FailureCause, FailureKind, OpAttempt, OpOutcome, PendingOp, StartedOp,
    SucceededOp,
};
pub use metrics::{MetricsSnapshot, OpMetrics};
pub use states::{determine_target_state, OpState};
pub use tracker::OpTracker;
