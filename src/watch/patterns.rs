// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::Result;

/// Patterns excluded from tracking by default: third-party package trees
/// are assumed immutable, and VCS metadata is never a module.
pub const DEFAULT_EXCLUDES: &[&str] = &["**/node_modules/**", "**/target/**", "**/.git/**"];

/// Compiled exclude globs, matched against absolute module paths.
///
/// A module whose path matches is still resolvable and loadable, it just
/// never gets a record, a version suffix, or a directory watch.
#[derive(Clone)]
pub struct ExcludeSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
        }
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set: builder.build()?,
        })
    }

    /// The [`DEFAULT_EXCLUDES`] set.
    pub fn defaults() -> Self {
        Self::new(DEFAULT_EXCLUDES).unwrap_or_default()
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for ExcludeSet {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }
}

impl fmt::Debug for ExcludeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExcludeSet")
            .field("patterns", &self.patterns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_match_package_trees() {
        let set = ExcludeSet::new(DEFAULT_EXCLUDES).unwrap();
        assert!(set.is_excluded(Path::new("/work/node_modules/pkg/index.js")));
        assert!(set.is_excluded(Path::new("/work/target/debug/build.rs")));
        assert!(!set.is_excluded(Path::new("/work/src/main.tiny")));
    }

    #[test]
    fn empty_set_excludes_nothing() {
        let set = ExcludeSet::default();
        assert!(!set.is_excluded(Path::new("/work/node_modules/pkg/index.js")));
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(ExcludeSet::new(&["src/[unclosed"]).is_err());
    }
}
