//! Cycle range parsing and allocator behavior across threads.

use loadgen_core::cycles::{CycleAllocator, CycleRange, MAX_CYCLE};
use loadgen_core::error::ErrorKind;
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn test_cycles_spec_forms() {
    let range: CycleRange = "10M".parse().unwrap();
    assert_eq!((range.start(), range.end()), (0, Some(10_000_000)));

    let range = CycleRange::parse("1_000..2K").unwrap();
    assert_eq!((range.start(), range.end()), (1_000, Some(2_000)));

    let range = CycleRange::parse("5..").unwrap();
    assert!(range.is_unbounded());
    assert_eq!(range.len(), None);

    assert!(CycleRange::parse("9..3").is_err());
    assert!(CycleRange::parse("ten").is_err());
}

#[test]
fn test_empty_range_is_exhausted_not_an_error() {
    let allocator = CycleAllocator::new(CycleRange::new(7, 7).unwrap());
    assert!(allocator.is_exhausted());
    assert_eq!(allocator.claim_next().unwrap(), None);
    assert!(allocator.claim_segment(10).unwrap().is_none());
}

#[test]
fn test_single_and_batch_claims_are_contiguous() {
    let allocator = CycleAllocator::new(CycleRange::new(100, 110).unwrap());
    assert_eq!(allocator.claim_next().unwrap(), Some(100));

    let segment = allocator.claim_segment(4).unwrap().unwrap();
    assert_eq!((segment.start(), segment.end()), (101, 105));

    let tail = allocator.claim_segment(100).unwrap().unwrap();
    assert_eq!(tail.collect::<Vec<_>>(), (105..110).collect::<Vec<_>>());
    assert!(allocator.claim_segment(1).unwrap().is_none());
}

#[test]
fn test_resume_continues_after_last_completed() {
    let range = CycleRange::new(0, 100).unwrap();
    let allocator = CycleAllocator::resuming_after(range, 41);
    assert_eq!(allocator.claim_next().unwrap(), Some(42));
    assert_eq!(allocator.remaining(), Some(57));
}

#[test]
fn test_unbounded_overflow_signals_exhaustion() {
    let range = CycleRange::unbounded(MAX_CYCLE - 1).unwrap();
    let allocator = CycleAllocator::new(range);

    assert_eq!(allocator.claim_next().unwrap(), Some(MAX_CYCLE - 1));
    assert_eq!(allocator.claim_next().unwrap(), Some(MAX_CYCLE));
    let err = allocator.claim_next().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AllocatorExhausted);
}

#[test]
fn test_concurrent_claims_partition_the_range() {
    let allocator = Arc::new(CycleAllocator::new(CycleRange::new(0, 25_000).unwrap()));

    let claimed: Vec<Vec<u64>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8u64)
            .map(|worker| {
                let allocator = Arc::clone(&allocator);
                scope.spawn(move || {
                    let stride = worker % 3 + 1;
                    let mut mine = Vec::new();
                    while let Some(segment) = allocator.claim_segment(stride).unwrap() {
                        mine.extend(segment);
                    }
                    mine
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let total: usize = claimed.iter().map(Vec::len).sum();
    let unique: HashSet<u64> = claimed.iter().flatten().copied().collect();
    assert_eq!(total, 25_000);
    assert_eq!(unique.len(), 25_000);
    assert!(claimed
        .iter()
        .all(|mine| mine.windows(2).all(|pair| pair[0] < pair[1])));
}
