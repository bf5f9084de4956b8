// src/registry/mod.rs

//! Module Registry.
//!
//! Process-wide table (owned by one engine, never a hidden global) mapping a
//! [`ModuleId`] to its [`ModuleRecord`]: version stamp, dependents and
//! registered acceptors. Records are created lazily on first reference and
//! never evicted; dependency edges only ever grow.
//!
//! - [`record`] holds the record and acceptor types.
//! - [`clock`] hands out version stamps.
//! - [`graph`] exports the dependency edges as a `petgraph` graph.

pub mod clock;
pub mod graph;
pub mod record;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::types::{ModuleId, Version};
use crate::watch::WatchTable;

pub use clock::VersionClock;
pub use graph::DependencyGraph;
pub use record::{AcceptFuture, Acceptor, AcceptorFn, ModuleInfo, ModuleRecord};

pub struct Registry<M> {
    modules: Mutex<HashMap<ModuleId, ModuleRecord<M>>>,
    clock: VersionClock,
    watches: Option<Arc<WatchTable>>,
}

impl<M> std::fmt::Debug for Registry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl<M> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Registry<M> {
    /// A registry that never creates directory watches.
    pub fn new() -> Self {
        Self {
            modules: Mutex::new(HashMap::new()),
            clock: VersionClock::new(),
            watches: None,
        }
    }

    /// A registry that starts watching a module's directory the first time
    /// the module is referenced.
    pub fn with_watches(watches: Arc<WatchTable>) -> Self {
        Self {
            watches: Some(watches),
            ..Self::new()
        }
    }

    /// Get-or-create the record for `id`. Returns true if it was created.
    ///
    /// This is the only place a directory watch is started.
    pub fn ensure(&self, id: &ModuleId) -> bool {
        let created = {
            let mut modules = self.lock();
            if modules.contains_key(id) {
                false
            } else {
                modules.insert(id.clone(), ModuleRecord::default());
                true
            }
        };

        if created {
            debug!(module = %id, "tracking module");
            if let Some(watches) = &self.watches {
                watches.track(id);
            }
        }
        created
    }

    pub fn get(&self, id: &ModuleId) -> Option<ModuleInfo> {
        self.lock().get(id).map(ModuleInfo::from)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Record that `dependent` resolved `dependency`.
    ///
    /// No-op (returns false) when the dependent is one of the engine's own
    /// internal identities.
    pub fn record_dependency(&self, dependency: &ModuleId, dependent: &ModuleId) -> bool {
        if dependent.is_internal() {
            return false;
        }
        self.ensure(dependency);
        let mut modules = self.lock();
        match modules.get_mut(dependency) {
            Some(record) => record.dependents.insert(dependent.clone()),
            None => false,
        }
    }

    /// Append an acceptor to `owner`'s record.
    pub fn add_acceptor(&self, owner: &ModuleId, dependency: &ModuleId, callback: AcceptorFn<M>) {
        self.ensure(owner);
        if let Some(record) = self.lock().get_mut(owner) {
            record.acceptors.push(Acceptor {
                dependency: dependency.clone(),
                callback,
            });
        }
    }

    /// Callbacks `owner` registered for `dependency`, in registration order.
    pub fn acceptors_for(&self, owner: &ModuleId, dependency: &ModuleId) -> Vec<AcceptorFn<M>> {
        self.lock()
            .get(owner)
            .map(|record| {
                record
                    .acceptors
                    .iter()
                    .filter(|a| &a.dependency == dependency)
                    .map(|a| Arc::clone(&a.callback))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn dependents(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.lock()
            .get(id)
            .map(|record| record.dependents.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn version(&self, id: &ModuleId) -> Option<Version> {
        self.lock().get(id).and_then(|record| record.version)
    }

    /// Next version stamp for a settle pass.
    pub fn next_version(&self) -> Version {
        self.clock.next()
    }

    /// Stamp `id` with `version`. Stamps never move backwards.
    ///
    /// Returns false if `id` has no record.
    pub fn stamp(&self, id: &ModuleId, version: Version) -> bool {
        match self.lock().get_mut(id) {
            Some(record) => {
                record.version = Some(record.version.map_or(version, |v| v.max(version)));
                true
            }
            None => false,
        }
    }

    /// Snapshot of every dependency edge.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let modules = self.lock();
        DependencyGraph::from_edges(
            modules.keys().cloned(),
            modules.iter().flat_map(|(id, record)| {
                record
                    .dependents
                    .iter()
                    .map(move |dependent| (id.clone(), dependent.clone()))
            }),
        )
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ModuleId, ModuleRecord<M>>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Acceptance;

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s)
    }

    fn accept_all() -> AcceptorFn<u32> {
        Arc::new(|_| Box::pin(async { Ok(Acceptance::Accepted) }))
    }

    #[test]
    fn ensure_is_idempotent_and_get_has_no_side_effect() {
        let registry: Registry<u32> = Registry::new();
        assert!(registry.get(&id("app:a")).is_none());
        assert!(!registry.contains(&id("app:a")));

        assert!(registry.ensure(&id("app:a")));
        assert!(!registry.ensure(&id("app:a")));
        assert_eq!(registry.len(), 1);

        let info = registry.get(&id("app:a")).unwrap();
        assert_eq!(info.version, None);
        assert!(info.dependents.is_empty());
    }

    #[test]
    fn record_dependency_creates_dependency_record_only() {
        let registry: Registry<u32> = Registry::new();
        assert!(registry.record_dependency(&id("app:c"), &id("app:b")));
        assert!(!registry.record_dependency(&id("app:c"), &id("app:b")));

        assert_eq!(registry.dependents(&id("app:c")), vec![id("app:b")]);
        assert!(!registry.contains(&id("app:b")));
    }

    #[test]
    fn internal_dependents_are_ignored() {
        let registry: Registry<u32> = Registry::new();
        assert!(!registry.record_dependency(&id("app:c"), &id("hotgraph:probe")));
        assert!(registry.is_empty());
    }

    #[test]
    fn acceptors_are_filtered_by_dependency_in_order() {
        let registry: Registry<u32> = Registry::new();
        registry.add_acceptor(&id("app:b"), &id("app:c"), accept_all());
        registry.add_acceptor(&id("app:b"), &id("app:d"), accept_all());
        registry.add_acceptor(&id("app:b"), &id("app:c"), accept_all());

        assert_eq!(registry.acceptors_for(&id("app:b"), &id("app:c")).len(), 2);
        assert_eq!(registry.acceptors_for(&id("app:b"), &id("app:x")).len(), 0);
        assert_eq!(registry.acceptors_for(&id("app:zz"), &id("app:c")).len(), 0);
        assert_eq!(
            registry.get(&id("app:b")).unwrap().acceptor_dependencies,
            vec![id("app:c"), id("app:d"), id("app:c")]
        );
    }

    #[test]
    fn stamps_never_move_backwards() {
        let registry: Registry<u32> = Registry::new();
        assert!(!registry.stamp(&id("app:a"), Version(5)));

        registry.ensure(&id("app:a"));
        assert!(registry.stamp(&id("app:a"), Version(5)));
        registry.stamp(&id("app:a"), Version(3));
        assert_eq!(registry.version(&id("app:a")), Some(Version(5)));
    }
}
