// src/engine/guard.rs

use std::collections::BTreeSet;

use tracing::debug;

use crate::types::ModuleId;

/// Permission to run one settle pass over `batch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTicket {
    pub pass: u64,
    pub batch: Vec<ModuleId>,
}

/// Single-flight guard for settle passes.
///
/// Semantics:
/// - `offer` merges a batch into the pending set. If no pass is running it
///   hands out a ticket for everything pending and marks a pass as running.
/// - While a pass runs, offers only accumulate; they are never interleaved
///   into the running pass.
/// - `complete` ends the running pass and, if anything accumulated in the
///   meantime, immediately hands out the ticket for the next one.
///
/// Identities offered several times before a pass starts appear in that
/// pass exactly once.
#[derive(Debug, Default)]
pub struct PassGuard {
    running: bool,
    pending: BTreeSet<ModuleId>,
    passes: u64,
}

impl PassGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn passes_started(&self) -> u64 {
        self.passes
    }

    pub fn offer(&mut self, batch: impl IntoIterator<Item = ModuleId>) -> Option<PassTicket> {
        self.pending.extend(batch);
        if self.running {
            debug!(
                pending = self.pending.len(),
                "settle pass running; deferring batch to the next pass"
            );
            return None;
        }
        self.start()
    }

    pub fn complete(&mut self) -> Option<PassTicket> {
        self.running = false;
        self.start()
    }

    fn start(&mut self) -> Option<PassTicket> {
        if self.pending.is_empty() {
            return None;
        }
        self.running = true;
        self.passes += 1;
        let batch: Vec<ModuleId> = std::mem::take(&mut self.pending).into_iter().collect();
        debug!(pass = self.passes, size = batch.len(), "starting settle pass");
        Some(PassTicket {
            pass: self.passes,
            batch,
        })
    }
}
