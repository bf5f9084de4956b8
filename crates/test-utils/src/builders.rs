#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hotgraph::config::EngineConfig;
use hotgraph::engine::{Engine, SettleReport};
use hotgraph::fs::mock::MockFileSystem;
use hotgraph::loader::SourceLoader;
use hotgraph::types::{Artifact, ModuleId};
use tokio::sync::broadcast;

use crate::recording::RecordingLifecycle;
use crate::tiny::{TinyCompiler, TinyModule};

/// Root of the in-memory tree. Must not exist on disk, so identities are
/// formed without canonicalization.
pub const VIRTUAL_ROOT: &str = "/hotgraph-virtual";

pub fn virtual_path(name: &str) -> PathBuf {
    PathBuf::from(VIRTUAL_ROOT).join(name)
}

pub fn virtual_id(name: &str) -> ModuleId {
    ModuleId::from_path(virtual_path(name)).expect("virtual path is a valid file URL")
}

pub type TinyEngine = Engine<SourceLoader<TinyCompiler>>;

/// Builder for an engine over a [`MockFileSystem`] with watching disabled;
/// tests report changes through [`TestEngine::change`].
pub struct TestEngineBuilder {
    files: Vec<(String, String)>,
    debounce: Duration,
}

impl TestEngineBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            debounce: Duration::from_millis(20),
        }
    }

    pub fn with_file(mut self, name: &str, source: &str) -> Self {
        self.files.push((name.to_string(), source.to_string()));
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Must be called inside a tokio runtime.
    pub fn build(self) -> TestEngine {
        let fs = MockFileSystem::new();
        for (name, source) in &self.files {
            fs.add_file(virtual_path(name), source.as_bytes());
        }

        let compiler = TinyCompiler::new();
        let lifecycle = RecordingLifecycle::new();
        let config = EngineConfig::default()
            .with_watch_enabled(false)
            .with_debounce(self.debounce);

        let engine = Engine::builder(SourceLoader::with_fs(Arc::new(fs.clone()), compiler.clone()))
            .config(config)
            .lifecycle(Arc::new(lifecycle.clone()))
            .filesystem(Arc::new(fs.clone()))
            .build()
            .expect("engine builds inside a runtime");
        let reports = engine.reports();

        TestEngine {
            engine,
            fs,
            compiler,
            lifecycle,
            reports,
        }
    }
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An engine plus handles on everything a test wants to poke at.
pub struct TestEngine {
    pub engine: TinyEngine,
    pub fs: MockFileSystem,
    pub compiler: TinyCompiler,
    pub lifecycle: RecordingLifecycle,
    pub reports: broadcast::Receiver<SettleReport>,
}

impl TestEngine {
    pub fn id(&self, name: &str) -> ModuleId {
        virtual_id(name)
    }

    /// Load `name` as an entry module.
    pub async fn load(&self, name: &str) -> Artifact<TinyModule> {
        let path = virtual_path(name);
        self.engine
            .load(&path.to_string_lossy())
            .await
            .expect("virtual path resolves")
    }

    pub fn write(&self, name: &str, source: &str) {
        self.fs.add_file(virtual_path(name), source.as_bytes());
    }

    /// Rewrite `name` and report the change, as a save in an editor would.
    pub fn change(&self, name: &str, source: &str) {
        self.write(name, source);
        self.engine.notify_changed(&self.id(name));
    }

    /// Wait for the next settle pass report.
    pub async fn next_report(&mut self) -> SettleReport {
        crate::with_timeout(self.reports.recv())
            .await
            .expect("report channel open")
    }

    /// Assert that no pass runs within `wait`.
    pub async fn assert_quiet(&mut self, wait: Duration) {
        match tokio::time::timeout(wait, self.reports.recv()).await {
            Err(_) => {}
            Ok(report) => panic!("unexpected settle pass: {report:?}"),
        }
    }
}
