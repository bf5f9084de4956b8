// src/engine/settle.rs

//! Cascade Settler.
//!
//! One pass takes a batch of changed identities and walks the dependents
//! graph with a worklist:
//!
//! 1. Every batch member gets the pass's version stamp before anything is
//!    reloaded, so a reload that imports another batch member sees the new
//!    version.
//! 2. Entries are reloaded one at a time, always picking one that no other
//!    pending entry can escalate to, so a module reloads after the
//!    dependencies that changed under it. An entry nothing depends on is an
//!    unhandled root.
//! 3. For each dependent, its acceptors for that entry run in registration
//!    order with the new artifact. If none accepts, the dependent is stamped
//!    and joins the worklist (once per pass).

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::engine::hot::ImportChain;
use crate::engine::EngineInner;
use crate::loader::ModuleLoader;
use crate::registry::{AcceptorFn, DependencyGraph};
use crate::types::{Acceptance, Artifact, ModuleId, Version};

/// Outcome of one settle pass, published to [`Engine::reports`](crate::engine::Engine::reports).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleReport {
    pub pass: u64,
    pub version: Version,
    /// The debounced batch that started the pass.
    pub batch: Vec<ModuleId>,
    /// Every module reloaded, in reload order.
    pub reloaded: Vec<ModuleId>,
    /// Reloads that produced the load-error sentinel.
    pub load_errors: Vec<ModuleId>,
    /// `(dependent, dependency)` pairs where an acceptor handled the change.
    pub accepted: Vec<(ModuleId, ModuleId)>,
    /// Dependents reloaded because nothing accepted a dependency's change.
    pub escalated: Vec<ModuleId>,
    /// Reloaded modules with no dependents.
    pub unhandled_roots: Vec<ModuleId>,
    pub restart_required: bool,
    pub elapsed: Duration,
}

impl SettleReport {
    fn new(pass: u64, version: Version, batch: Vec<ModuleId>) -> Self {
        Self {
            pass,
            version,
            batch,
            reloaded: Vec::new(),
            load_errors: Vec::new(),
            accepted: Vec::new(),
            escalated: Vec::new(),
            unhandled_roots: Vec::new(),
            restart_required: false,
            elapsed: Duration::ZERO,
        }
    }
}

pub(crate) async fn run_pass<L: ModuleLoader>(
    inner: &EngineInner<L>,
    pass: u64,
    batch: Vec<ModuleId>,
) -> SettleReport {
    let started = Instant::now();
    let registry = inner.registry();
    let version = registry.next_version();
    let mut report = SettleReport::new(pass, version, batch.clone());

    let mut seen: HashSet<ModuleId> = HashSet::new();
    let mut work: VecDeque<ModuleId> = VecDeque::new();
    for id in batch {
        if !registry.contains(&id) {
            debug!(module = %id, "change for untracked module ignored");
            continue;
        }
        if seen.insert(id.clone()) {
            registry.stamp(&id, version);
            work.push_back(id);
        }
    }

    let graph = registry.dependency_graph();
    while let Some(id) = take_next(&mut work, &graph) {
        if !registry.contains(&id) {
            // An owner that is not itself a module (a CLI or test consumer).
            debug!(module = %id, "escalation reached an untracked owner");
            report.unhandled_roots.push(id);
            continue;
        }

        let artifact = inner
            .import_module(id.clone(), String::new(), ImportChain::default())
            .await;
        report.reloaded.push(id.clone());
        if artifact.is_load_error() {
            report.load_errors.push(id.clone());
        }

        let dependents = registry.dependents(&id);
        if dependents.is_empty() {
            debug!(module = %id, "change reached a module with no dependents");
            report.unhandled_roots.push(id.clone());
            continue;
        }

        for dependent in dependents {
            let mut accepted = false;
            for callback in registry.acceptors_for(&dependent, &id) {
                match invoke(callback, artifact.clone()).await {
                    Ok(Acceptance::Accepted) => accepted = true,
                    Ok(Acceptance::Declined) => {
                        debug!(%dependent, dependency = %id, "acceptor declined");
                    }
                    Err(err) => {
                        warn!(
                            %dependent,
                            dependency = %id,
                            error = %format!("{err:#}"),
                            "acceptor failed"
                        );
                    }
                }
            }

            if accepted {
                report.accepted.push((dependent, id.clone()));
            } else if seen.insert(dependent.clone()) {
                registry.stamp(&dependent, version);
                report.escalated.push(dependent.clone());
                work.push_back(dependent);
            }
        }
    }

    report.restart_required = !report.unhandled_roots.is_empty();
    report.elapsed = started.elapsed();
    info!(
        pass,
        version = version.0,
        reloaded = report.reloaded.len(),
        accepted = report.accepted.len(),
        load_errors = report.load_errors.len(),
        restart_required = report.restart_required,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "settle pass finished"
    );
    report
}

/// Pop the first entry no other pending entry reaches. In a cycle every
/// entry is reachable, and the front is taken.
fn take_next(work: &mut VecDeque<ModuleId>, graph: &DependencyGraph) -> Option<ModuleId> {
    let ready = (0..work.len()).find(|&i| {
        work.iter()
            .enumerate()
            .all(|(j, other)| j == i || !graph.reaches(other, &work[i]))
    });
    work.remove(ready.unwrap_or(0))
}

/// Run one acceptor on its own task so a panic counts as a failure.
async fn invoke<M: Send + 'static>(
    callback: AcceptorFn<M>,
    artifact: Artifact<M>,
) -> anyhow::Result<Acceptance> {
    match tokio::spawn(async move { callback(artifact).await }).await {
        Ok(result) => result,
        Err(err) => Err(anyhow!("acceptor panicked: {err}")),
    }
}
