//! Step identifiers and the allocator that hands them out.
//!
//! Every step created anywhere in a search (fresh insertions, method
//! sub-step clones, decomposition brackets) draws its id from one shared
//! [`IdAllocator`], so ids stay unique across concurrently expanded branches.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier of a plan step. Unique for the lifetime of an [`IdAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u64);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Atomic counters for step ids and plan lineage serials.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_step: AtomicU64,
    next_plan: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start step ids at `first`. Lets tests pin ids deterministically.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next_step: AtomicU64::new(first),
            next_plan: AtomicU64::new(0),
        }
    }

    pub fn next_step(&self) -> StepId {
        StepId(self.next_step.fetch_add(1, Ordering::Relaxed))
    }

    /// Serial number used to build plan lineage ids.
    pub fn next_plan_serial(&self) -> u64 {
        self.next_plan.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let ids = IdAllocator::starting_at(10);
        assert_eq!(ids.next_step(), StepId(10));
        assert_eq!(ids.next_step(), StepId(11));
        assert_eq!(ids.next_plan_serial(), 0);
        assert_eq!(ids.next_plan_serial(), 1);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next_step()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("worker panicked") {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
