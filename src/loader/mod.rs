// src/loader/mod.rs

//! Boundary with the module loader.
//!
//! The engine never parses or executes anything itself. It asks a
//! [`ModuleLoader`] to produce a module value for an identity, and hands the
//! loader a [`LoadContext`] through which the module resolves and imports
//! its own dependencies (which records the dependency edges) and reaches
//! its hot handle.
//!
//! - [`resolve`] holds the [`Resolver`] seam and the default file resolver.
//! - [`source`] provides a loader that reads source text through the
//!   [`FileSystem`](crate::fs::FileSystem) abstraction and hands it to a
//!   [`Compile`] implementation.
//! - [`text`] is the plain-text compiler used by the CLI.

pub mod resolve;
pub mod source;
pub mod text;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;

use crate::engine::hot::{HotHandle, ImportChain, ModuleHost};
use crate::types::{Artifact, ModuleId, Version};

pub use resolve::{FileResolver, Resolved, Resolver};
pub use source::{Compile, SourceLoader};
pub use text::{TextCompiler, TextModule};

/// Future returned by loaders and compilers.
pub type LoadFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Produces module values. Called for the initial load and for every reload.
///
/// An error is never propagated into the engine: it becomes the load-error
/// sentinel delivered to acceptors and subscribers.
pub trait ModuleLoader: Send + Sync + 'static {
    type Module: Clone + Send + Sync + 'static;

    fn load(&self, cx: LoadContext<Self::Module>) -> LoadFuture<'_, Self::Module>;
}

/// What a loader knows about the module it is producing.
pub struct LoadContext<M> {
    host: Arc<dyn ModuleHost<M>>,
    id: ModuleId,
    key: String,
    version: Option<Version>,
    chain: ImportChain,
}

impl<M> std::fmt::Debug for LoadContext<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("version", &self.version)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl<M: Clone + Send + Sync + 'static> LoadContext<M> {
    pub(crate) fn new(
        host: Arc<dyn ModuleHost<M>>,
        id: ModuleId,
        key: String,
        version: Option<Version>,
        chain: ImportChain,
    ) -> Self {
        Self {
            host,
            id,
            key,
            version,
            chain,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// The identity plus its version stamp; differs between reloads.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Filesystem location of the module being loaded.
    pub fn path(&self) -> anyhow::Result<PathBuf> {
        self.id
            .to_path()
            .ok_or_else(|| anyhow!("{} is not a file module", self.id))
    }

    /// Resolve `specifier` from this module, recording the dependency edge.
    pub fn resolve(&self, specifier: &str) -> crate::errors::Result<Resolved> {
        self.host.resolve(specifier, Some(&self.id))
    }

    /// Resolve and import a dependency at its current version.
    ///
    /// A dependency that fails to load yields its load-error sentinel; only
    /// a resolve failure is an error here. Importing a module whose load is
    /// still waiting on this one yields an import-cycle load error.
    pub fn import<'a>(
        &'a self,
        specifier: &'a str,
    ) -> Pin<Box<dyn Future<Output = crate::errors::Result<Artifact<M>>> + Send + 'a>> {
        Box::pin(async move {
            let resolved = self.resolve(specifier)?;
            Ok(self
                .host
                .import(resolved.id, resolved.search, self.chain.clone())
                .await)
        })
    }

    /// The hot handle of the module being loaded.
    pub fn hot(&self) -> HotHandle<M> {
        HotHandle::new(Arc::clone(&self.host), self.id.clone())
    }
}
