// src/engine/subscription.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::hot::{boxed_acceptor, ImportChain, ModuleHost};
use crate::types::{Acceptance, Artifact, LoadFailure, ModuleId};

/// Live stream of a module's versions.
///
/// The first item is the initial load; every later item is the reloaded
/// module (or its load-error sentinel) delivered when the module changes.
/// Because a subscription accepts its dependency, changes stop at the
/// subscriber instead of escalating past it.
///
/// Dropping or [cancelling](Self::cancel) the subscription stops delivery;
/// from then on its acceptor declines, so later changes escalate normally.
pub struct Subscription<M> {
    id: ModuleId,
    initial: Option<JoinHandle<Artifact<M>>>,
    rx: mpsc::UnboundedReceiver<Artifact<M>>,
    open: Arc<AtomicBool>,
}

impl<M> std::fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("open", &self.open.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<M: Clone + Send + Sync + 'static> Subscription<M> {
    /// Register the acceptor on `owner` and kick off the initial import.
    pub(crate) fn start(host: Arc<dyn ModuleHost<M>>, owner: ModuleId, id: ModuleId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&open);
        host.accept(
            &owner,
            &id,
            boxed_acceptor(move |artifact| {
                let tx = tx.clone();
                let flag = Arc::clone(&flag);
                async move {
                    if !flag.load(Ordering::Acquire) {
                        return Ok::<_, anyhow::Error>(Acceptance::Declined);
                    }
                    match tx.send(artifact) {
                        Ok(()) => Ok(Acceptance::Accepted),
                        Err(_) => Ok(Acceptance::Declined),
                    }
                }
            }),
        );

        let initial = {
            let id = id.clone();
            tokio::spawn(async move {
                host.import(id, String::new(), ImportChain::default())
                    .await
            })
        };

        Self {
            id,
            initial: Some(initial),
            rx,
            open,
        }
    }
}

impl<M> Subscription<M> {
    /// Identity of the subscribed module.
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn is_cancelled(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }

    /// Next version of the module.
    ///
    /// Returns `None` once the subscription is cancelled or the engine is
    /// gone.
    pub async fn next(&mut self) -> Option<Artifact<M>> {
        if let Some(initial) = self.initial.take() {
            return Some(match initial.await {
                Ok(artifact) => artifact,
                Err(err) => Artifact::LoadError(LoadFailure {
                    module: self.id.clone(),
                    message: format!("initial load did not complete: {err}"),
                }),
            });
        }
        if self.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    /// Stop delivery. Items already queued are discarded.
    pub fn cancel(&mut self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(module = %self.id, "subscription cancelled");
        }
        self.rx.close();
        if let Some(initial) = self.initial.take() {
            initial.abort();
        }
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        self.cancel();
    }
}
