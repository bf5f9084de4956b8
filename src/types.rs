// src/types.rs

//! Shared value types: module identities, version stamps and artifacts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::errors::{HotError, Result};
use crate::watch::path_utils::absolutize;

/// Identities in this namespace belong to the engine itself and never take
/// part in dependency tracking.
pub const INTERNAL_PREFIX: &str = "hotgraph:";

/// Query parameter carrying the version stamp in a versioned key.
pub const VERSION_PARAM: &str = "v";

/// Canonical key naming one loadable unit.
///
/// File-backed modules use their `file://` URL (query and fragment removed).
/// Any other string is accepted verbatim as an opaque identity; equality is
/// exact-string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Identity of the file at `path`, made absolute first.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = absolutize(path.as_ref());
        let url = Url::from_file_path(&path).map_err(|_| HotError::Resolve {
            specifier: path.display().to_string(),
            referrer: "<filesystem>".to_string(),
            reason: "not representable as a file URL".to_string(),
        })?;
        Ok(Self::from_url(&url))
    }

    /// Identity for a URL; query and fragment are not part of the identity.
    pub fn from_url(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_query(None);
        url.set_fragment(None);
        Self::new(url.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_file(&self) -> bool {
        self.0.starts_with("file://")
    }

    pub fn is_internal(&self) -> bool {
        self.0.starts_with(INTERNAL_PREFIX)
    }

    /// Filesystem location of a file-backed identity.
    pub fn to_path(&self) -> Option<PathBuf> {
        if !self.is_file() {
            return None;
        }
        Url::parse(&self.0).ok()?.to_file_path().ok()
    }

    /// The key handed to the loader: this identity plus `search` with the
    /// version parameter set to `version` (or removed when there is none).
    pub fn versioned_key(&self, search: &str, version: Option<Version>) -> String {
        let mut params: Vec<String> = search
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| pair.split('=').next() != Some(VERSION_PARAM))
            .map(str::to_string)
            .collect();

        if let Some(v) = version {
            params.push(format!("{VERSION_PARAM}={v}"));
        }

        if params.is_empty() {
            self.0.to_string()
        } else {
            format!("{}?{}", self.0, params.join("&"))
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Split a specifier or URL into its base and its search string.
///
/// The search keeps its leading `?`; a fragment is dropped from both.
pub fn split_search(s: &str) -> (&str, &str) {
    let without_hash = s.split_once('#').map_or(s, |(head, _)| head);
    match without_hash.find('?') {
        Some(q) => (&without_hash[..q], &without_hash[q..]),
        None => (without_hash, ""),
    }
}

/// Monotonic version stamp assigned by the settler on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u64);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The load-error sentinel: why a module could not be (re)loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load {module}: {message}")]
pub struct LoadFailure {
    pub module: ModuleId,
    pub message: String,
}

/// What acceptors and subscribers receive for a (re)loaded module.
#[derive(Debug, Clone)]
pub enum Artifact<M> {
    Module(M),
    LoadError(LoadFailure),
}

impl<M> Artifact<M> {
    pub fn module(&self) -> Option<&M> {
        match self {
            Artifact::Module(m) => Some(m),
            Artifact::LoadError(_) => None,
        }
    }

    pub fn is_load_error(&self) -> bool {
        matches!(self, Artifact::LoadError(_))
    }

    pub fn into_result(self) -> std::result::Result<M, LoadFailure> {
        match self {
            Artifact::Module(m) => Ok(m),
            Artifact::LoadError(e) => Err(e),
        }
    }
}

/// Verdict of one acceptor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The change is handled for this dependent.
    Accepted,
    /// The acceptor ran but did not take the change (e.g. its subscriber is
    /// gone); the change keeps escalating unless another acceptor takes it.
    Declined,
}
