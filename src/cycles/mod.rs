//! # Cycle Allocation
//!
//! Cycles are the unit of work: every op an activity executes is keyed by a
//! cycle number, and every binding derives its values from that number.
//! [`CycleAllocator`] hands out disjoint, gap-free segments of a
//! [`CycleRange`] to concurrent workers.

pub mod allocator;
pub mod range;

pub use allocator::{CycleAllocator, CycleSegment};
pub use range::{CycleRange, MAX_CYCLE};
