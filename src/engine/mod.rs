// src/engine/mod.rs

//! Hot-reload engine.
//!
//! This module ties together:
//! - the module registry (identities, dependents, acceptors, versions)
//! - the watch multiplexer and the debounced change collector
//! - the cascade settler, guarded so only one pass runs at a time
//! - the consumer-facing API: acceptors, subscriptions and hot handles
//!
//! The settle algorithm lives in [`settle`] and the single-flight rules in
//! [`guard`]; this file is the async shell that owns the shared state and
//! wires the background tasks together.

pub mod guard;
pub mod hot;
pub mod lifecycle;
pub mod settle;
pub mod subscription;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::collector::{spawn_collector, CollectorHandle};
use crate::config::EngineConfig;
use crate::errors::{HotError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::loader::{FileResolver, LoadContext, ModuleLoader, Resolved, Resolver};
use crate::registry::{AcceptorFn, DependencyGraph, Registry};
use crate::types::{split_search, Acceptance, Artifact, LoadFailure, ModuleId, Version};
use crate::watch::{spawn_multiplexer, ContentDigests, WatchTable};

pub use guard::{PassGuard, PassTicket};
pub use hot::{HotHandle, ImportChain, ModuleHost};
pub use lifecycle::{Lifecycle, ProcessLifecycle};
pub use settle::SettleReport;
pub use subscription::Subscription;

const REPORT_CAPACITY: usize = 64;

/// A loaded module value and the version it was loaded at.
struct Instance<M> {
    version: Option<Version>,
    value: M,
}

/// Shared engine state. Background tasks hold it weakly.
pub(crate) struct EngineInner<L: ModuleLoader> {
    config: EngineConfig,
    loader: L,
    resolver: Box<dyn Resolver>,
    registry: Registry<L::Module>,
    watches: Arc<WatchTable>,
    instances: Mutex<HashMap<ModuleId, Instance<L::Module>>>,
    guard: Mutex<PassGuard>,
    collector: CollectorHandle,
    reports: broadcast::Sender<SettleReport>,
    lifecycle: Arc<dyn Lifecycle>,
    self_ref: Weak<EngineInner<L>>,
}

impl<L: ModuleLoader> EngineInner<L> {
    pub(crate) fn registry(&self) -> &Registry<L::Module> {
        &self.registry
    }

    fn host(&self) -> Option<Arc<dyn ModuleHost<L::Module>>> {
        let inner = self.self_ref.upgrade()?;
        Some(inner as Arc<dyn ModuleHost<L::Module>>)
    }

    fn is_tracked_identity(&self, id: &ModuleId) -> bool {
        !id.is_internal() && !self.watches.is_excluded(id)
    }

    fn resolve_module(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<Resolved> {
        let location = self.resolver.resolve(specifier, referrer)?;
        let (base, search) = split_search(&location);
        let id = ModuleId::new(base);
        let tracked = self.is_tracked_identity(&id);

        if tracked {
            match referrer {
                Some(referrer) => {
                    self.registry.record_dependency(&id, referrer);
                }
                None => {
                    self.registry.ensure(&id);
                }
            }
        } else {
            debug!(module = %id, "resolved untracked module");
        }

        let version = if tracked { self.registry.version(&id) } else { None };
        Ok(Resolved {
            key: id.versioned_key(search, version),
            search: search.to_string(),
            id,
            tracked,
        })
    }

    fn cached(&self, id: &ModuleId, version: Option<Version>) -> Option<L::Module> {
        self.lock_instances()
            .get(id)
            .filter(|instance| instance.version == version)
            .map(|instance| instance.value.clone())
    }

    pub(crate) async fn import_module(
        &self,
        id: ModuleId,
        search: String,
        chain: ImportChain,
    ) -> Artifact<L::Module> {
        let version = self.registry.version(&id);
        if let Some(value) = self.cached(&id, version) {
            return Artifact::Module(value);
        }

        if chain.contains(&id) {
            let path = chain
                .modules()
                .iter()
                .chain(std::iter::once(&id))
                .map(ModuleId::as_str)
                .collect::<Vec<_>>()
                .join(" -> ");
            warn!(module = %id, cycle = %path, "import cycle");
            return Artifact::LoadError(LoadFailure {
                module: id,
                message: format!("import cycle: {path}"),
            });
        }

        let Some(host) = self.host() else {
            return Artifact::LoadError(LoadFailure {
                module: id,
                message: "engine is shutting down".to_string(),
            });
        };

        let key = id.versioned_key(&search, version);
        debug!(module = %id, %key, "loading module");
        let cx = LoadContext::new(host, id.clone(), key, version, chain.push(id.clone()));
        match self.loader.load(cx).await {
            Ok(value) => {
                self.store_instance(id, version, value.clone());
                Artifact::Module(value)
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(module = %id, error = %message, "module failed to load");
                Artifact::LoadError(LoadFailure { module: id, message })
            }
        }
    }

    /// Cache a finished load unless a newer version got there first.
    fn store_instance(&self, id: ModuleId, version: Option<Version>, value: L::Module) {
        let mut instances = self.lock_instances();
        match instances.get(&id) {
            Some(existing) if existing.version > version => {
                debug!(module = %id, "discarding load of an outdated version");
            }
            _ => {
                instances.insert(id, Instance { version, value });
            }
        }
    }

    fn register_acceptor(&self, owner: &ModuleId, dependency: &ModuleId, callback: AcceptorFn<L::Module>) {
        if self.is_tracked_identity(dependency) {
            self.registry.record_dependency(dependency, owner);
        }
        self.registry.add_acceptor(owner, dependency, callback);
    }

    /// Hand a settled batch to the guard; start a pass task if none runs.
    fn offer_batch(self: &Arc<Self>, batch: Vec<ModuleId>) {
        let ticket = self.lock_guard().offer(batch);
        if let Some(ticket) = ticket {
            tokio::spawn(run_passes(Arc::clone(self), ticket));
        }
    }

    fn lock_instances(&self) -> MutexGuard<'_, HashMap<ModuleId, Instance<L::Module>>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_guard(&self) -> MutexGuard<'_, PassGuard> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: ModuleLoader> ModuleHost<L::Module> for EngineInner<L> {
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<Resolved> {
        self.resolve_module(specifier, referrer)
    }

    fn import(
        &self,
        id: ModuleId,
        search: String,
        chain: ImportChain,
    ) -> hot::ImportFuture<'_, L::Module> {
        Box::pin(self.import_module(id, search, chain))
    }

    fn accept(&self, owner: &ModuleId, dependency: &ModuleId, callback: AcceptorFn<L::Module>) {
        self.register_acceptor(owner, dependency, callback);
    }

    fn subscribe(self: Arc<Self>, owner: ModuleId, dependency: ModuleId) -> Subscription<L::Module> {
        Subscription::start(self, owner, dependency)
    }
}

/// Run passes until the guard has nothing left, then release it.
async fn run_passes<L: ModuleLoader>(inner: Arc<EngineInner<L>>, mut ticket: PassTicket) {
    loop {
        let report = settle::run_pass(&inner, ticket.pass, ticket.batch).await;
        if report.restart_required {
            inner.lifecycle.restart_required(&report);
        }
        // No receivers is fine.
        let _ = inner.reports.send(report);

        let next = inner.lock_guard().complete();
        match next {
            Some(next) => ticket = next,
            None => break,
        }
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder<L: ModuleLoader> {
    loader: L,
    config: EngineConfig,
    resolver: Option<Box<dyn Resolver>>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    fs: Option<Arc<dyn FileSystem>>,
}

impl<L: ModuleLoader> EngineBuilder<L> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: impl Resolver) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Defaults to [`ProcessLifecycle`] built from the restart config.
    pub fn lifecycle(mut self, lifecycle: Arc<dyn Lifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Filesystem used by the content-hash filter.
    pub fn filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Spawn the background tasks. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Engine<L>> {
        tokio::runtime::Handle::try_current().map_err(|_| HotError::NoRuntime)?;

        let EngineBuilder {
            loader,
            config,
            resolver,
            lifecycle,
            fs,
        } = self;

        let fs = fs.unwrap_or_else(|| Arc::new(RealFileSystem));
        let digests = config
            .use_hash
            .then(|| Arc::new(ContentDigests::new(fs)));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let watches = Arc::new(WatchTable::new(
            config.watch_enabled,
            config.exclude.clone(),
            digests.clone(),
            events_tx,
        ));
        let lifecycle =
            lifecycle.unwrap_or_else(|| Arc::new(ProcessLifecycle::from_config(&config.restart)));
        let resolver = resolver.unwrap_or_else(|| Box::new(FileResolver));
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);

        info!(
            watch = config.watch_enabled,
            debounce_ms = config.debounce.as_millis() as u64,
            use_hash = config.use_hash,
            "starting hot-reload engine"
        );

        let inner = Arc::new_cyclic(|weak: &Weak<EngineInner<L>>| {
            let on_batch = weak.clone();
            let collector = spawn_collector(config.debounce, move |batch| {
                if let Some(inner) = on_batch.upgrade() {
                    inner.offer_batch(batch);
                }
            });

            EngineInner {
                registry: Registry::with_watches(Arc::clone(&watches)),
                watches,
                loader,
                resolver,
                instances: Mutex::new(HashMap::new()),
                guard: Mutex::new(PassGuard::new()),
                collector,
                reports,
                lifecycle,
                self_ref: weak.clone(),
                config,
            }
        });

        let weak = Arc::downgrade(&inner);
        spawn_multiplexer(
            events_rx,
            Arc::new(move |id: &ModuleId| {
                weak.upgrade()
                    .is_some_and(|inner| inner.registry.contains(id))
            }),
            digests,
            inner.collector.clone(),
        );

        Ok(Engine { inner })
    }
}

/// Handle to a running hot-reload engine. Cheap to clone.
///
/// Each engine owns its own registry; nothing is process-global.
pub struct Engine<L: ModuleLoader> {
    inner: Arc<EngineInner<L>>,
}

impl<L: ModuleLoader> Clone for Engine<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ModuleLoader> std::fmt::Debug for Engine<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("modules", &self.inner.registry.len())
            .field("watches", &self.inner.watches.len())
            .finish_non_exhaustive()
    }
}

impl<L: ModuleLoader> Engine<L> {
    pub fn builder(loader: L) -> EngineBuilder<L> {
        EngineBuilder {
            loader,
            config: EngineConfig::default(),
            resolver: None,
            lifecycle: None,
            fs: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    pub fn registry(&self) -> &Registry<L::Module> {
        &self.inner.registry
    }

    pub fn watches(&self) -> &WatchTable {
        &self.inner.watches
    }

    /// Resolve `specifier`.
    ///
    /// With a referrer the dependency edge is recorded; without one the
    /// result is treated as an entry module and its record is ensured.
    pub fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<Resolved> {
        self.inner.resolve_module(specifier, referrer)
    }

    /// The module at its current version, loading it if needed.
    pub async fn import(&self, id: &ModuleId) -> Artifact<L::Module> {
        self.inner
            .import_module(id.clone(), String::new(), ImportChain::default())
            .await
    }

    /// Resolve an entry specifier and import it.
    pub async fn load(&self, specifier: &str) -> Result<Artifact<L::Module>> {
        let resolved = self.resolve(specifier, None)?;
        Ok(self
            .inner
            .import_module(resolved.id, resolved.search, ImportChain::default())
            .await)
    }

    /// Register a synchronous acceptor: `Ok(())` accepts the change.
    pub fn accept_dependency<F>(&self, owner: &ModuleId, dependency: &ModuleId, callback: F)
    where
        F: Fn(Artifact<L::Module>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        self.accept_dependency_async(owner, dependency, move |artifact| {
            let callback = Arc::clone(&callback);
            async move { callback(artifact).map(|()| Acceptance::Accepted) }
        });
    }

    /// Register an asynchronous acceptor that decides whether it handled
    /// the change.
    pub fn accept_dependency_async<F, Fut>(&self, owner: &ModuleId, dependency: &ModuleId, callback: F)
    where
        F: Fn(Artifact<L::Module>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Acceptance>> + Send + 'static,
    {
        self.inner
            .register_acceptor(owner, dependency, hot::boxed_acceptor(callback));
    }

    /// Live stream of `dependency`'s versions, accepted on behalf of `owner`.
    pub fn subscribe(&self, owner: &ModuleId, dependency: &ModuleId) -> Subscription<L::Module> {
        Arc::clone(&self.inner).subscribe(owner.clone(), dependency.clone())
    }

    /// The hot handle for `owner`, as module code would receive it.
    pub fn hot_handle(&self, owner: &ModuleId) -> HotHandle<L::Module> {
        HotHandle::new(Arc::clone(&self.inner) as Arc<dyn ModuleHost<L::Module>>, owner.clone())
    }

    /// Report a change by hand, as if the watcher had seen it.
    pub fn notify_changed(&self, id: &ModuleId) {
        self.inner.collector.notify(id.clone());
    }

    /// Receiver for the report of every settle pass started after this call.
    pub fn reports(&self) -> broadcast::Receiver<SettleReport> {
        self.inner.reports.subscribe()
    }

    pub fn is_settling(&self) -> bool {
        self.inner.lock_guard().is_running()
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        self.inner.registry.dependency_graph()
    }

    /// Let the process exit even though directory watches are live.
    pub fn allow_process_shutdown(&self) {
        info!("watches no longer keep the process alive");
        self.inner.watches.allow_shutdown();
    }

    /// Resolves once no watch keeps the process alive.
    pub async fn until_shutdown(&self) {
        self.inner.watches.released().await;
    }
}
