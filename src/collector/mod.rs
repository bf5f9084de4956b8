// src/collector/mod.rs

//! Debounced Change Collector.
//!
//! Accumulates changed identities and hands them to the settler as one
//! batch after a quiet period, coalescing editor save patterns (temp file +
//! rename, backup writes) and multi-file edits into a single settle pass.
//!
//! The timing rules live in the pure [`Debouncer`]; this module only adds
//! the channel and the task that drives it.

pub mod debouncer;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::types::ModuleId;

pub use debouncer::Debouncer;

/// Sending side of the collector; cheap to clone.
#[derive(Debug, Clone)]
pub struct CollectorHandle {
    tx: mpsc::UnboundedSender<ModuleId>,
}

impl CollectorHandle {
    /// Add `id` to the pending set and restart the quiet window.
    pub fn notify(&self, id: ModuleId) {
        if self.tx.send(id).is_err() {
            debug!("collector stopped; dropping change notification");
        }
    }
}

/// Spawn the collector task. `on_batch` receives each settled batch.
pub fn spawn_collector<F>(window: Duration, on_batch: F) -> CollectorHandle
where
    F: Fn(Vec<ModuleId>) + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<ModuleId>();

    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(window);

        loop {
            let wake_at = debouncer
                .deadline()
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(86400));

            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Some(id) => {
                        debug!(module = %id, "change collected");
                        debouncer.add(id, Instant::now());
                    }
                    None => break,
                },
                _ = sleep_until(wake_at), if debouncer.has_pending() => {
                    if let Some(batch) = debouncer.take_if_ready(Instant::now()) {
                        debug!(size = batch.len(), "quiet window elapsed; flushing batch");
                        on_batch(batch);
                    }
                }
            }
        }
        debug!("collector finished");
    });

    CollectorHandle { tx }
}
