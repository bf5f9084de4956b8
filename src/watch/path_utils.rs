// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Make `path` absolute and canonicalize its parent directory.
///
/// Only the parent is canonicalized so that identities can be formed for
/// files that do not exist yet (a subscriber may wait for a file to appear).
/// Canonicalizing matters on platforms (notably macOS) where the same
/// directory is reachable under different absolute prefixes, e.g.
/// `/var/...` vs `/private/var/...`; watch events report the canonical one.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => absolute,
        },
        _ => absolute,
    }
}

/// Resolve the name reported by a directory watch against that directory.
///
/// Backends report either absolute paths or names relative to the watched
/// directory.
pub fn resolve_event_path(dir: &Path, name: &Path) -> PathBuf {
    if name.is_absolute() {
        name.to_path_buf()
    } else {
        dir.join(name)
    }
}
