// src/loader/source.rs

use std::sync::Arc;

use anyhow::Context;

use crate::fs::{FileSystem, RealFileSystem};
use crate::loader::{LoadContext, LoadFuture, ModuleLoader};

/// Turns source text into a module value.
///
/// Implementations resolve and import their dependencies through the
/// context, which is what records the dependency edges.
pub trait Compile: Send + Sync + 'static {
    type Module: Clone + Send + Sync + 'static;

    fn compile(&self, source: String, cx: LoadContext<Self::Module>) -> LoadFuture<'_, Self::Module>;
}

/// Loader for file-backed modules: read the text, then compile it.
pub struct SourceLoader<C> {
    fs: Arc<dyn FileSystem>,
    compiler: C,
}

impl<C> std::fmt::Debug for SourceLoader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLoader")
            .field("fs", &self.fs)
            .finish_non_exhaustive()
    }
}

impl<C: Compile> SourceLoader<C> {
    pub fn new(compiler: C) -> Self {
        Self::with_fs(Arc::new(RealFileSystem), compiler)
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>, compiler: C) -> Self {
        Self { fs, compiler }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }
}

impl<C: Compile> ModuleLoader for SourceLoader<C> {
    type Module = C::Module;

    fn load(&self, cx: LoadContext<Self::Module>) -> LoadFuture<'_, Self::Module> {
        Box::pin(async move {
            let path = cx.path()?;
            let source = self
                .fs
                .read_to_string(&path)
                .with_context(|| format!("loading {}", cx.key()))?;
            self.compiler.compile(source, cx).await
        })
    }
}
