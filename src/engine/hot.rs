// src/engine/hot.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::subscription::Subscription;
use crate::errors::Result;
use crate::loader::Resolved;
use crate::registry::AcceptorFn;
use crate::types::{Acceptance, Artifact, ModuleId};

/// Future returned by [`ModuleHost::import`].
pub type ImportFuture<'a, M> = Pin<Box<dyn Future<Output = Artifact<M>> + Send + 'a>>;

/// Modules whose loads are waiting on an import, outermost first.
///
/// An import of a module already on the chain is an import cycle: loading
/// it again would never finish.
#[derive(Debug, Clone, Default)]
pub struct ImportChain(Arc<Vec<ModuleId>>);

impl ImportChain {
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.0.contains(id)
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.0
    }

    pub(crate) fn push(&self, id: ModuleId) -> Self {
        let mut chain = Vec::with_capacity(self.0.len() + 1);
        chain.extend(self.0.iter().cloned());
        chain.push(id);
        Self(Arc::new(chain))
    }
}

/// What running module code can ask of the engine.
///
/// Implemented by the engine internals; loaders and module code only see it
/// through [`LoadContext`](crate::loader::LoadContext) and [`HotHandle`].
pub trait ModuleHost<M>: Send + Sync {
    /// Resolve `specifier` and record `referrer` as a dependent of the result.
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<Resolved>;

    /// The module at its current version, loading it if needed.
    ///
    /// `chain` holds the modules whose loads are waiting on this import.
    fn import(&self, id: ModuleId, search: String, chain: ImportChain) -> ImportFuture<'_, M>;

    /// Register `callback` on `owner` for changes of `dependency`.
    fn accept(&self, owner: &ModuleId, dependency: &ModuleId, callback: AcceptorFn<M>);

    /// Start a stream of `dependency`'s versions on behalf of `owner`.
    fn subscribe(self: Arc<Self>, owner: ModuleId, dependency: ModuleId) -> Subscription<M>;
}

/// The per-module hot-reload API.
///
/// Every handle is bound to the module it was created for; acceptors and
/// subscriptions registered through it belong to that module.
pub struct HotHandle<M> {
    host: Arc<dyn ModuleHost<M>>,
    owner: ModuleId,
}

impl<M> Clone for HotHandle<M> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            owner: self.owner.clone(),
        }
    }
}

impl<M> std::fmt::Debug for HotHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotHandle")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl<M: Clone + Send + Sync + 'static> HotHandle<M> {
    pub(crate) fn new(host: Arc<dyn ModuleHost<M>>, owner: ModuleId) -> Self {
        Self { host, owner }
    }

    pub fn owner(&self) -> &ModuleId {
        &self.owner
    }

    /// Resolve `specifier` relative to the owning module.
    pub fn resolve(&self, specifier: &str) -> Result<Resolved> {
        self.host.resolve(specifier, Some(&self.owner))
    }

    /// Handle changes of `specifier` in place with a synchronous callback.
    ///
    /// Returning `Ok(())` accepts the change; an error is logged and counts
    /// as not accepting it.
    pub fn accept<F>(&self, specifier: &str, callback: F) -> Result<ModuleId>
    where
        F: Fn(Artifact<M>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        self.accept_async(specifier, move |artifact| {
            let callback = Arc::clone(&callback);
            async move { callback(artifact).map(|()| Acceptance::Accepted) }
        })
    }

    /// Like [`accept`](Self::accept), with an asynchronous callback that
    /// decides whether the change was handled.
    pub fn accept_async<F, Fut>(&self, specifier: &str, callback: F) -> Result<ModuleId>
    where
        F: Fn(Artifact<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Acceptance>> + Send + 'static,
    {
        let resolved = self.resolve(specifier)?;
        self.host
            .accept(&self.owner, &resolved.id, boxed_acceptor(callback));
        Ok(resolved.id)
    }

    /// Import `specifier` as a live stream: the first item is the initial
    /// load, each later item a reload.
    pub fn import(&self, specifier: &str) -> Result<Subscription<M>> {
        let resolved = self.resolve(specifier)?;
        Ok(Arc::clone(&self.host).subscribe(self.owner.clone(), resolved.id))
    }
}

/// Erase an async callback into the registry's acceptor type.
pub(crate) fn boxed_acceptor<M, F, Fut>(callback: F) -> AcceptorFn<M>
where
    F: Fn(Artifact<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Acceptance>> + Send + 'static,
{
    Arc::new(move |artifact| Box::pin(callback(artifact)))
}
