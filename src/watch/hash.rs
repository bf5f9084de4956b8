// src/watch/hash.rs

//! Content digests for the `use_hash` filter.
//!
//! Editors frequently emit events without changing a file (touch, metadata
//! rewrites, save-without-edit). With `use_hash` enabled the multiplexer
//! compares a blake3 digest of the file with the last one it saw and drops
//! the event when nothing changed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use blake3::Hash;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the digest of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<Hash> {
    let bytes = fs.read(path)?;
    Ok(blake3::hash(&bytes))
}

/// Last observed digest per file.
#[derive(Debug)]
pub struct ContentDigests {
    fs: Arc<dyn FileSystem>,
    digests: Mutex<HashMap<PathBuf, Hash>>,
}

impl ContentDigests {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            digests: Mutex::new(HashMap::new()),
        }
    }

    /// Record the current digest of `path` without reporting a change.
    ///
    /// Called when a module is first tracked, so the first real edit is
    /// compared against the content that was actually loaded.
    pub fn prime(&self, path: &Path) {
        if let Ok(hash) = compute_file_hash(self.fs.as_ref(), path) {
            self.lock().insert(path.to_path_buf(), hash);
        }
    }

    /// Returns true if the content of `path` differs from the last
    /// observation, and remembers the new digest.
    ///
    /// An unreadable file (removed, mid-rename) always counts as changed
    /// and forgets the stored digest, so its reappearance counts too.
    pub fn changed(&self, path: &Path) -> bool {
        let hash = match compute_file_hash(self.fs.as_ref(), path) {
            Ok(h) => h,
            Err(err) => {
                debug!(?path, error = %err, "digest unavailable; treating as changed");
                self.lock().remove(path);
                return true;
            }
        };

        match self.lock().insert(path.to_path_buf(), hash) {
            Some(previous) if previous == hash => {
                debug!(?path, "content unchanged; dropping event");
                false
            }
            _ => true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Hash>> {
        self.digests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn unchanged_content_is_filtered_after_priming() {
        let fs = MockFileSystem::new();
        fs.add_file("/m.tiny", "export default 1");
        let digests = ContentDigests::new(Arc::new(fs.clone()));

        digests.prime(Path::new("/m.tiny"));
        assert!(!digests.changed(Path::new("/m.tiny")));

        fs.add_file("/m.tiny", "export default 2");
        assert!(digests.changed(Path::new("/m.tiny")));
        assert!(!digests.changed(Path::new("/m.tiny")));
    }

    #[test]
    fn missing_file_counts_as_changed_and_reappearance_too() {
        let fs = MockFileSystem::new();
        fs.add_file("/m.tiny", "export default 1");
        let digests = ContentDigests::new(Arc::new(fs.clone()));
        digests.prime(Path::new("/m.tiny"));

        fs.remove(Path::new("/m.tiny")).unwrap();
        assert!(digests.changed(Path::new("/m.tiny")));

        fs.add_file("/m.tiny", "export default 1");
        assert!(digests.changed(Path::new("/m.tiny")));
    }
}
