// src/watch/watcher.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::collector::CollectorHandle;
use crate::types::ModuleId;
use crate::watch::hash::ContentDigests;
use crate::watch::path_utils::resolve_event_path;
use crate::watch::patterns::ExcludeSet;

/// A raw notification from one directory watch.
#[derive(Debug)]
pub struct WatchEvent {
    pub dir: PathBuf,
    pub event: Event,
}

/// One live OS watch. Dropping it stops the watch.
struct DirectoryWatch {
    _inner: RecommendedWatcher,
    /// Whether this watch keeps [`WatchTable::released`] pending.
    blocking: bool,
}

/// Per-directory watch table shared by every tracked module.
///
/// At most one OS watch exists per directory. Watches are never removed
/// once created; watching is best-effort and failures only get logged.
pub struct WatchTable {
    enabled: bool,
    exclude: ExcludeSet,
    digests: Option<Arc<ContentDigests>>,
    dirs: Mutex<HashMap<PathBuf, DirectoryWatch>>,
    events_tx: mpsc::UnboundedSender<WatchEvent>,
    unref: AtomicBool,
    released: Notify,
}

impl std::fmt::Debug for WatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchTable")
            .field("enabled", &self.enabled)
            .field("exclude", &self.exclude)
            .field("dirs", &self.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl WatchTable {
    pub fn new(
        enabled: bool,
        exclude: ExcludeSet,
        digests: Option<Arc<ContentDigests>>,
        events_tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Self {
        Self {
            enabled,
            exclude,
            digests,
            dirs: Mutex::new(HashMap::new()),
            events_tx,
            unref: AtomicBool::new(false),
            released: Notify::new(),
        }
    }

    /// True if `id` is a file module under an excluded tree.
    pub fn is_excluded(&self, id: &ModuleId) -> bool {
        id.to_path()
            .is_some_and(|path| self.exclude.is_excluded(&path))
    }

    /// Start watching the directory of a newly tracked module.
    ///
    /// Non-file identities and excluded paths are never watched.
    pub fn track(&self, id: &ModuleId) {
        let Some(path) = id.to_path() else {
            return;
        };
        if self.exclude.is_excluded(&path) {
            return;
        }
        if let Some(digests) = &self.digests {
            digests.prime(&path);
        }
        if let Some(dir) = path.parent() {
            self.watch_directory(dir);
        }
    }

    /// Ensure an OS watch exists for `dir`. Returns true if one was created.
    pub fn watch_directory(&self, dir: &Path) -> bool {
        if !self.enabled {
            return false;
        }

        let mut dirs = self.lock();
        if dirs.contains_key(dir) {
            return false;
        }

        let tx = self.events_tx.clone();
        let event_dir = dir.to_path_buf();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    // The receiver only goes away when the engine does.
                    let _ = tx.send(WatchEvent {
                        dir: event_dir.clone(),
                        event,
                    });
                }
                Err(err) => debug!(dir = ?event_dir, error = %err, "directory watch error"),
            },
            Config::default(),
        );

        let mut watcher = match watcher {
            Ok(w) => w,
            Err(err) => {
                warn!(?dir, error = %err, "failed to create directory watch");
                return false;
            }
        };

        if let Err(err) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            warn!(?dir, error = %err, "failed to watch directory; changes there will be missed");
            return false;
        }

        info!(?dir, "watching directory");
        dirs.insert(
            dir.to_path_buf(),
            DirectoryWatch {
                _inner: watcher,
                blocking: !self.unref.load(Ordering::Acquire),
            },
        );
        true
    }

    pub fn is_watched(&self, dir: &Path) -> bool {
        self.lock().contains_key(dir)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Mark all current and future watches as not keeping the process alive.
    pub fn allow_shutdown(&self) {
        self.unref.store(true, Ordering::Release);
        for watch in self.lock().values_mut() {
            watch.blocking = false;
        }
        self.released.notify_waiters();
    }

    /// Number of watches that still keep the process alive.
    pub fn blocking_count(&self) -> usize {
        self.lock().values().filter(|w| w.blocking).count()
    }

    /// Resolves once no blocking watch remains.
    pub async fn released(&self) {
        loop {
            let notified = self.released.notified();
            if self.blocking_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, DirectoryWatch>> {
        self.dirs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether a raw event can mean the module content changed.
///
/// Access and metadata-only notifications are noise (and reading a module
/// during reload would otherwise feed back into the watcher).
pub fn is_content_event(kind: &EventKind) -> bool {
    !matches!(
        kind,
        EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_))
    )
}

/// Translate raw watch events into module identities for the collector.
///
/// `is_tracked` answers whether an identity has a registry record; events
/// for untracked files in a watched directory are dropped.
pub fn spawn_multiplexer(
    mut events_rx: mpsc::UnboundedReceiver<WatchEvent>,
    is_tracked: Arc<dyn Fn(&ModuleId) -> bool + Send + Sync>,
    digests: Option<Arc<ContentDigests>>,
    collector: CollectorHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(WatchEvent { dir, event }) = events_rx.recv().await {
            if !is_content_event(&event.kind) {
                continue;
            }
            debug!(?dir, kind = ?event.kind, paths = ?event.paths, "received notify event");

            for name in &event.paths {
                let path = resolve_event_path(&dir, name);
                let Ok(id) = ModuleId::from_path(&path) else {
                    continue;
                };
                if !is_tracked(&id) {
                    continue;
                }
                if let Some(digests) = &digests {
                    let digests = Arc::clone(digests);
                    let probe = path.clone();
                    let changed = tokio::task::spawn_blocking(move || digests.changed(&probe))
                        .await
                        .unwrap_or(true);
                    if !changed {
                        continue;
                    }
                }
                debug!(module = %id, "watch match -> notifying collector");
                collector.notify(id);
            }
        }
        debug!("watch multiplexer finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};

    fn table(enabled: bool) -> WatchTable {
        let (tx, _rx) = mpsc::unbounded_channel();
        WatchTable::new(enabled, ExcludeSet::default(), None, tx)
    }

    #[test]
    fn filters_noise_events() {
        assert!(!is_content_event(&EventKind::Access(AccessKind::Any)));
        assert!(!is_content_event(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::WriteTime
        ))));
        assert!(is_content_event(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_content_event(&EventKind::Create(CreateKind::File)));
    }

    #[test]
    fn one_watch_per_directory() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(true);
        assert!(table.watch_directory(dir.path()));
        assert!(!table.watch_directory(dir.path()));
        assert_eq!(table.len(), 1);
        assert!(table.is_watched(dir.path()));
    }

    #[test]
    fn missing_directory_is_not_fatal() {
        let table = table(true);
        assert!(!table.watch_directory(Path::new("/no/such/hotgraph/dir")));
        assert!(table.is_empty());
    }

    #[test]
    fn disabled_table_never_watches() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(false);
        assert!(!table.watch_directory(dir.path()));
        assert!(table.is_empty());
    }

    #[test]
    fn allow_shutdown_releases_existing_and_future_watches() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let table = table(true);
        table.watch_directory(a.path());
        assert_eq!(table.blocking_count(), 1);

        table.allow_shutdown();
        assert_eq!(table.blocking_count(), 0);

        table.watch_directory(b.path());
        assert_eq!(table.len(), 2);
        assert_eq!(table.blocking_count(), 0);
    }
}
