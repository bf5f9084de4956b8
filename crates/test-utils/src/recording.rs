use std::sync::{Arc, Mutex};

use hotgraph::engine::{Lifecycle, SettleReport};

/// Lifecycle that records restart requests instead of exiting.
#[derive(Debug, Clone, Default)]
pub struct RecordingLifecycle {
    requests: Arc<Mutex<Vec<SettleReport>>>,
}

impl RecordingLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restarts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<SettleReport> {
        self.requests.lock().unwrap().clone()
    }
}

impl Lifecycle for RecordingLifecycle {
    fn restart_required(&self, report: &SettleReport) {
        self.requests.lock().unwrap().push(report.clone());
    }
}
