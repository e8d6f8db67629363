//! Process-wide generation clock
//!
//! Every transaction creation and every direct mutation advances the clock.
//! Targets record the generation of their last committed change; buffers
//! record the generation they observed on first touch. Commit validation
//! compares the two.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// A point on the generation clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Generation before anything happened
    pub const ZERO: Generation = Generation(0);

    /// Wrap a raw counter value
    pub const fn new(value: u64) -> Self {
        Generation(value)
    }

    /// Raw counter value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Most recently issued generation
pub fn current_generation() -> Generation {
    Generation(CLOCK.load(Ordering::SeqCst))
}

/// Advance the clock and return the new generation
pub fn next_generation() -> Generation {
    Generation(CLOCK.fetch_add(1, Ordering::SeqCst) + 1)
}
