//! # Op Tracker
//!
//! Bounds concurrency and accounts for every admitted op. Admission waits on
//! a semaphore sized to `max_in_flight`; completion or drop of a
//! [`StartedOp`] returns the slot. [`OpTracker::drain`] closes admission and
//! waits until nothing is in flight.

use super::facets::{CompletedOp, OpOutcome, PendingOp, StartedOp};
use super::metrics::OpMetrics;
use crate::error::{ActivityError, ActivityResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, trace};

#[derive(Debug, Default)]
struct InFlightAccounting {
    in_flight: AtomicUsize,
    released: Notify,
}

/// One unit of in-flight capacity held by a [`StartedOp`].
#[derive(Debug)]
pub(crate) struct InFlightSlot {
    accounting: Arc<InFlightAccounting>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        // Decrement before the permit goes back so the counter never
        // overshoots the semaphore bound.
        self.accounting.in_flight.fetch_sub(1, Ordering::AcqRel);
        drop(self.permit.take());
        self.accounting.released.notify_waiters();
    }
}

#[derive(Debug)]
pub struct OpTracker {
    max_in_flight: usize,
    permits: Arc<Semaphore>,
    accounting: Arc<InFlightAccounting>,
    metrics: Arc<OpMetrics>,
}

impl OpTracker {
    pub fn new(max_in_flight: usize, metrics: Arc<OpMetrics>) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            max_in_flight,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            accounting: Arc::new(InFlightAccounting::default()),
            metrics,
        }
    }

    /// Wait for capacity, then move `op` to started.
    ///
    /// Fails with [`ActivityError::AdmissionClosed`] once the tracker is
    /// closed, including for callers already waiting.
    pub async fn admit(&self, op: PendingOp) -> ActivityResult<StartedOp> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ActivityError::AdmissionClosed)?;

        let in_flight = self.accounting.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        let slot = InFlightSlot {
            accounting: Arc::clone(&self.accounting),
            permit: Some(permit),
        };

        let cycle = op.cycle();
        let attempt = op.attempt();
        let started = op.start(slot)?;
        self.metrics.record_started();
        trace!(cycle, attempt, in_flight, "Op admitted");
        Ok(started)
    }

    /// Move a started op to its terminal state and record it.
    pub fn complete(&self, op: StartedOp, outcome: OpOutcome) -> ActivityResult<CompletedOp> {
        let completed = op.finish(outcome)?;
        self.metrics.record(&completed);
        trace!(
            cycle = completed.cycle(),
            state = %completed.state(),
            duration_us = completed.duration().as_micros() as u64,
            "Op completed"
        );
        Ok(completed)
    }

    /// Refuse further admissions and wake every waiting admitter.
    pub fn close(&self) {
        if !self.permits.is_closed() {
            self.permits.close();
            debug!(in_flight = self.in_flight(), "Op admission closed");
        }
    }

    /// Close admission and wait until every started op has completed.
    pub async fn drain(&self) {
        self.close();
        loop {
            let released = self.accounting.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if self.is_idle() {
                break;
            }
            released.await;
        }
        info!(alias = %self.metrics.alias(), "✅ Op tracker drained");
    }

    fn is_idle(&self) -> bool {
        self.accounting.in_flight.load(Ordering::Acquire) == 0
            && self.permits.available_permits() == self.max_in_flight
    }

    pub fn in_flight(&self) -> usize {
        self.accounting.in_flight.load(Ordering::Acquire)
    }

    /// Current admission limit: zero once closed.
    pub fn max_in_flight(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.max_in_flight
        }
    }

    pub fn configured_max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn available_slots(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.permits.available_permits()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn metrics(&self) -> &Arc<OpMetrics> {
        &self.metrics
    }
}
