//! Lamport timestamp for ordering concurrent edits
//!
//! Lamport clocks provide a "happens-before" partial ordering of events in a
//! distributed system. Each replica maintains its own clock, ticks it on local
//! operations, and folds in the timestamp of every remote operation it applies.
//! The RGA comparator breaks remaining ties by author id and counter.

use serde::{Deserialize, Serialize};

/// Lamport timestamp for causality tracking
///
/// # Properties
///
/// - Monotonically increasing: the clock never decreases
/// - Update on apply: clock = max(local, remote)
///
/// # Example
///
/// ```rust
/// use peritext_core::crdt::LamportClock;
///
/// let mut clock = LamportClock::new();
/// assert_eq!(clock.value(), 0);
///
/// let ts = clock.tick();
/// assert_eq!(ts, 1);
///
/// clock.update(5); // Applied a remote operation stamped 5
/// assert_eq!(clock.tick(), 6);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    /// Create a new Lamport clock starting at 0
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Get the current clock value
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Increment the clock and return the new value (for local operations)
    pub fn tick(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Fold in a remote timestamp: clock = max(local, remote)
    pub fn update(&mut self, remote: u64) {
        self.value = self.value.max(remote);
    }
}
