// src/loader/text.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::loader::{Compile, LoadContext, LoadFuture};
use crate::types::Version;

/// A text file taken as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextModule {
    pub path: PathBuf,
    pub text: Arc<str>,
    /// blake3 hex digest of `text`.
    pub digest: String,
    pub version: Option<Version>,
}

impl TextModule {
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// First 12 hex characters of the digest.
    pub fn short_digest(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }
}

/// Compiler producing [`TextModule`]s; plain text has no dependencies.
#[derive(Debug, Clone, Default)]
pub struct TextCompiler;

impl Compile for TextCompiler {
    type Module = TextModule;

    fn compile(&self, source: String, cx: LoadContext<TextModule>) -> LoadFuture<'_, TextModule> {
        Box::pin(async move {
            let digest = blake3::hash(source.as_bytes()).to_hex().to_string();
            Ok(TextModule {
                path: cx.path()?,
                text: Arc::from(source),
                digest,
                version: cx.version(),
            })
        })
    }
}
