//! Lock-free cycle allocation.
//!
//! A single atomic cursor is advanced with compare-and-swap. Each successful
//! CAS hands out a disjoint segment, so the union of every claim is the
//! contiguous prefix of the range with no gaps and no duplicates.

use super::range::{CycleRange, MAX_CYCLE};
use crate::error::{ActivityError, ActivityResult};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Contiguous run of cycles `[start, end)` claimed by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSegment {
    start: u64,
    end: u64,
    next: u64,
}

impl CycleSegment {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            next: start,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Iterator for CycleSegment {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }
        let cycle = self.next;
        self.next += 1;
        Some(cycle)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Hands out cycle numbers from a [`CycleRange`] to any number of workers.
#[derive(Debug)]
pub struct CycleAllocator {
    range: CycleRange,
    next: CachePadded<AtomicU64>,
}

impl CycleAllocator {
    pub fn new(range: CycleRange) -> Self {
        Self {
            next: CachePadded::new(AtomicU64::new(range.start())),
            range,
        }
    }

    /// Allocator positioned just past `last_completed`, for resuming a run.
    pub fn resuming_after(range: CycleRange, last_completed: u64) -> Self {
        let allocator = Self::new(range);
        allocator.resume_after(last_completed);
        allocator
    }

    /// Move the cursor to `last_completed + 1`, never behind the range start.
    pub fn resume_after(&self, last_completed: u64) {
        let next = last_completed.saturating_add(1).max(self.range.start());
        self.next.store(next, Ordering::Release);
        debug!(next_cycle = next, range = %self.range, "Cycle allocator repositioned");
    }

    pub fn range(&self) -> CycleRange {
        self.range
    }

    /// The next cycle that would be handed out.
    pub fn next_cycle(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }

    /// Cycles left in a bounded range, `None` when unbounded.
    pub fn remaining(&self) -> Option<u64> {
        self.range
            .end()
            .map(|end| end.saturating_sub(self.next_cycle()))
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_cycle() >= self.range.limit()
    }

    /// Claim a single cycle.
    pub fn claim_next(&self) -> ActivityResult<Option<u64>> {
        Ok(self.claim_segment(1)?.map(|segment| segment.start()))
    }

    /// Claim up to `stride` consecutive cycles.
    ///
    /// Returns `Ok(None)` once a bounded range is exhausted; the final segment
    /// is truncated at the range end. An unbounded range that runs past
    /// [`MAX_CYCLE`] fails with [`ActivityError::AllocatorExhausted`].
    pub fn claim_segment(&self, stride: u64) -> ActivityResult<Option<CycleSegment>> {
        let stride = stride.max(1);
        let limit = self.range.limit();
        let mut current = self.next.load(Ordering::Acquire);

        loop {
            if current >= limit {
                if self.range.is_unbounded() {
                    return Err(ActivityError::AllocatorExhausted {
                        next: current,
                        max: MAX_CYCLE,
                    });
                }
                return Ok(None);
            }

            let end = current.saturating_add(stride).min(limit);
            match self.next.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(Some(CycleSegment::new(current, end))),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashSet;

    #[test]
    fn test_segments_follow_stride_and_truncate() {
        let allocator = CycleAllocator::new(CycleRange::new(0, 10).unwrap());
        let first = allocator.claim_segment(4).unwrap().unwrap();
        let second = allocator.claim_segment(4).unwrap().unwrap();
        let third = allocator.claim_segment(4).unwrap().unwrap();

        assert_eq!((first.start(), first.end()), (0, 4));
        assert_eq!((second.start(), second.end()), (4, 8));
        assert_eq!((third.start(), third.end()), (8, 10));
        assert!(allocator.claim_segment(4).unwrap().is_none());
        assert!(allocator.is_exhausted());
    }

    #[test]
    fn test_empty_range_yields_nothing() {
        let allocator = CycleAllocator::new(CycleRange::new(5, 5).unwrap());
        assert!(allocator.claim_next().unwrap().is_none());
        assert_eq!(allocator.remaining(), Some(0));
    }

    #[test]
    fn test_concurrent_claims_partition_range() {
        let allocator = CycleAllocator::new(CycleRange::new(100, 10_100).unwrap());
        let claimed: Vec<Vec<u64>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let mut mine = Vec::new();
                        while let Some(segment) = allocator.claim_segment(7).unwrap() {
                            mine.extend(segment);
                        }
                        mine
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut seen = HashSet::new();
        let mut total = 0;
        for cycles in claimed {
            for cycle in cycles {
                assert!(seen.insert(cycle), "cycle {cycle} claimed twice");
                total += 1;
            }
        }
        assert_eq!(total, 10_000);
        assert_eq!(seen.iter().min(), Some(&100));
        assert_eq!(seen.iter().max(), Some(&10_099));
    }

    #[test]
    fn test_resume_skips_completed_prefix() {
        let range = CycleRange::new(0, 100).unwrap();
        let allocator = CycleAllocator::resuming_after(range, 41);
        assert_eq!(allocator.claim_next().unwrap(), Some(42));
        assert_eq!(allocator.remaining(), Some(57));
    }

    #[test]
    fn test_unbounded_range_overflows_with_error() {
        let allocator = CycleAllocator::new(CycleRange::unbounded(MAX_CYCLE - 2).unwrap());
        let last = allocator.claim_segment(10).unwrap().unwrap();
        assert_eq!(last.start(), MAX_CYCLE - 2);
        assert_eq!(last.end(), MAX_CYCLE + 1);

        let err = allocator.claim_segment(10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocatorExhausted);
    }

    #[test]
    fn test_segment_iterates_in_order() {
        let cycles: Vec<u64> = CycleSegment::new(3, 6).collect();
        assert_eq!(cycles, vec![3, 4, 5]);
    }
}
