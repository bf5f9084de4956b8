// src/registry/record.rs

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::types::{Acceptance, Artifact, ModuleId, Version};

/// Future returned by an acceptor callback.
pub type AcceptFuture = Pin<Box<dyn Future<Output = anyhow::Result<Acceptance>> + Send>>;

/// Callback invoked with the freshly loaded dependency (or its load error).
pub type AcceptorFn<M> = Arc<dyn Fn(Artifact<M>) -> AcceptFuture + Send + Sync>;

/// "If `dependency` changes, call `callback` instead of escalating."
pub struct Acceptor<M> {
    pub dependency: ModuleId,
    pub callback: AcceptorFn<M>,
}

impl<M> Clone for Acceptor<M> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<M> fmt::Debug for Acceptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acceptor")
            .field("dependency", &self.dependency)
            .finish_non_exhaustive()
    }
}

/// Tracked metadata for one module. Lives for the lifetime of the registry.
pub struct ModuleRecord<M> {
    /// `None` until the engine has reloaded the module at least once.
    pub version: Option<Version>,
    /// Modules that resolved this one as a dependency. Only ever grows.
    pub dependents: BTreeSet<ModuleId>,
    /// Acceptors registered by this module's own code, in registration order.
    pub acceptors: Vec<Acceptor<M>>,
}

impl<M> Default for ModuleRecord<M> {
    fn default() -> Self {
        Self {
            version: None,
            dependents: BTreeSet::new(),
            acceptors: Vec::new(),
        }
    }
}

impl<M> fmt::Debug for ModuleRecord<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("version", &self.version)
            .field("dependents", &self.dependents)
            .field("acceptors", &self.acceptors)
            .finish()
    }
}

/// Read-only snapshot of a record, safe to hand out of the registry lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub version: Option<Version>,
    pub dependents: Vec<ModuleId>,
    pub acceptor_dependencies: Vec<ModuleId>,
}

impl<M> From<&ModuleRecord<M>> for ModuleInfo {
    fn from(record: &ModuleRecord<M>) -> Self {
        Self {
            version: record.version,
            dependents: record.dependents.iter().cloned().collect(),
            acceptor_dependencies: record
                .acceptors
                .iter()
                .map(|a| a.dependency.clone())
                .collect(),
        }
    }
}
