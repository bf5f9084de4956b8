// src/registry/clock.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Version;

/// Hands out strictly increasing version stamps.
///
/// Stamps are wall-clock milliseconds when the clock moves forward fast
/// enough, and `last + 1` otherwise, so two passes within the same
/// millisecond (or a clock going backwards) never reuse a stamp.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Version {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Version(candidate),
                Err(actual) => current = actual,
            }
        }
    }
}
