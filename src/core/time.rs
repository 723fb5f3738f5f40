//! Logical modification clock.
//!
//! Every change that can make cached pipeline data stale (a parameter edit,
//! a rebound input, freshly generated output) takes a new tick from a single
//! process-wide counter. Comparing ticks tells the update engine what must
//! be recomputed without looking at any pixel data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// A point on the logical clock. Larger means more recent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ModifiedTime(u64);

impl ModifiedTime {
    /// The time before anything happened.
    pub const NEVER: ModifiedTime = ModifiedTime(0);

    /// Take the next tick of the clock.
    pub fn tick() -> Self {
        Self(CLOCK.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Raw tick value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Whether this is [`ModifiedTime::NEVER`].
    pub fn is_never(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ModifiedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_increase() {
        let a = ModifiedTime::tick();
        let b = ModifiedTime::tick();
        assert!(b > a);
        assert!(a > ModifiedTime::NEVER);
        assert!(ModifiedTime::NEVER.is_never());
        assert!(!a.is_never());
    }
}
