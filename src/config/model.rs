// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::watch::patterns::{ExcludeSet, DEFAULT_EXCLUDES};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// enabled = true
/// debounce_ms = 50
/// exclude = ["**/node_modules/**"]
/// use_hash = false
///
/// [restart]
/// exit_code = 75
/// supervisor_env = "HOTGRAPH_SUPERVISED"
/// message = "reload-required"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub restart: RestartSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Create OS watches. When false, changes only arrive through
    /// `Engine::notify_changed`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Quiet window of the change collector, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Globs for third-party trees: resolved, never tracked or watched.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Drop change events whose file content digest did not change.
    #[serde(default)]
    pub use_hash: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            debounce_ms: default_debounce_ms(),
            exclude: default_exclude(),
            use_hash: false,
        }
    }
}

/// `[restart]` section.
///
/// Controls how the process ends when a change reaches a module nobody
/// depends on.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestartSection {
    /// Exit status when running standalone.
    #[serde(default = "default_exit_code")]
    pub exit_code: i64,

    /// Environment variable whose presence means a supervisor is watching.
    #[serde(default = "default_supervisor_env")]
    pub supervisor_env: String,

    /// Line written to stdout for the supervisor.
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_exit_code() -> i64 {
    75
}

fn default_supervisor_env() -> String {
    "HOTGRAPH_SUPERVISED".to_string()
}

fn default_message() -> String {
    "reload-required".to_string()
}

impl Default for RestartSection {
    fn default() -> Self {
        Self {
            exit_code: default_exit_code(),
            supervisor_env: default_supervisor_env(),
            message: default_message(),
        }
    }
}

/// Validated engine configuration.
///
/// Built from a [`RawConfigFile`] via `TryFrom`; the default equals an
/// empty config file.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub watch_enabled: bool,
    pub debounce: Duration,
    pub exclude: ExcludeSet,
    pub use_hash: bool,
    pub restart: RestartConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartConfig {
    pub exit_code: i32,
    pub supervisor_env: String,
    pub message: String,
}

impl Default for RestartConfig {
    fn default() -> Self {
        let raw = RestartSection::default();
        Self {
            exit_code: 75,
            supervisor_env: raw.supervisor_env,
            message: raw.message,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watch_enabled: default_enabled(),
            debounce: Duration::from_millis(default_debounce_ms()),
            exclude: ExcludeSet::defaults(),
            use_hash: false,
            restart: RestartConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_watch_enabled(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    pub fn with_use_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }
}
