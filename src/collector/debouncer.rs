// src/collector/debouncer.rs

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::ModuleId;

/// Pure debouncer: only handles timing and deduplication of changed
/// identities. No engine access, no IO.
///
/// Every [`add`](Debouncer::add) restarts the quiet window; the batch
/// becomes ready once a full window passes without another change.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeSet<ModuleId>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    pub fn add(&mut self, id: ModuleId, now: Instant) {
        self.pending.insert(id);
        self.last_event = Some(now);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// When the current batch becomes ready, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_event.map(|t| t + self.window)
    }

    /// Take the batch if the quiet window has elapsed, leaving a fresh
    /// empty set behind.
    pub fn take_if_ready(&mut self, now: Instant) -> Option<Vec<ModuleId>> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(50);

    #[test]
    fn empty_debouncer_is_never_ready() {
        let mut d = Debouncer::new(WINDOW);
        assert_eq!(d.deadline(), None);
        assert_eq!(d.take_if_ready(Instant::now() + WINDOW * 10), None);
    }

    #[test]
    fn each_add_restarts_the_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.add(ModuleId::new("m"), t0);
        d.add(ModuleId::new("m"), t0 + Duration::from_millis(40));

        // 50ms after the first event, but only 10ms after the second.
        assert_eq!(d.take_if_ready(t0 + WINDOW), None);
        assert_eq!(d.deadline(), Some(t0 + Duration::from_millis(90)));

        let batch = d.take_if_ready(t0 + Duration::from_millis(90)).unwrap();
        assert_eq!(batch, vec![ModuleId::new("m")]);
        assert!(!d.has_pending());
    }

    #[test]
    fn burst_of_distinct_modules_becomes_one_batch() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        for (i, name) in ["b", "a", "b", "c", "a"].iter().enumerate() {
            d.add(ModuleId::new(name), t0 + Duration::from_millis(i as u64 * 5));
        }
        let batch = d.take_if_ready(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(
            batch,
            vec![ModuleId::new("a"), ModuleId::new("b"), ModuleId::new("c")]
        );
        assert_eq!(d.take_if_ready(t0 + Duration::from_secs(2)), None);
    }
}
