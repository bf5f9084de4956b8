// src/lib.rs

pub mod cli;
pub mod collector;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate, load_or_default, EngineConfig};
use crate::engine::Engine;
use crate::loader::{SourceLoader, TextCompiler, TextModule};
use crate::types::{Artifact, ModuleId};

pub use crate::engine::{HotHandle, SettleReport};
pub use crate::errors::HotError;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (CLI overrides on top)
/// - the engine with the plain-text loader
/// - a subscription to the entry file, printed per version
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config = load_config(&args)?;
    let engine = Engine::builder(SourceLoader::new(TextCompiler))
        .config(config)
        .build()?;

    let entry = engine
        .resolve(&args.file.to_string_lossy(), None)
        .with_context(|| format!("cannot resolve {}", args.file.display()))?;
    info!(module = %entry.id, "following entry module");

    let owner = ModuleId::new("cli:main");
    let mut updates = engine.subscribe(&owner, &entry.id);
    let mut reports = engine.reports();

    loop {
        tokio::select! {
            artifact = updates.next() => match artifact {
                Some(artifact) => print_artifact(&artifact),
                None => break,
            },
            report = reports.recv(), if args.print_graph => match report {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    println!("{}", engine.dependency_graph().to_dot());
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received; stopping");
                break;
            }
            _ = engine.until_shutdown(), if engine.config().watch_enabled => {
                debug!("no watch keeps the process alive");
                break;
            }
        }
    }

    updates.cancel();
    Ok(())
}

fn load_config(args: &CliArgs) -> Result<EngineConfig> {
    let path = Path::new(&args.config);
    let mut config = if path == default_config_path() {
        load_or_default(path)?
    } else {
        load_and_validate(path).with_context(|| format!("loading {}", path.display()))?
    };

    if let Some(ms) = args.debounce_ms {
        if ms == 0 {
            warn!("--debounce-ms 0 raised to 1");
        }
        config = config.with_debounce(Duration::from_millis(ms.max(1)));
    }
    Ok(config)
}

fn print_artifact(artifact: &Artifact<TextModule>) {
    match artifact {
        Artifact::Module(module) => println!(
            "{} v{} lines={} digest={}",
            module.path.display(),
            module.version.map(|v| v.0).unwrap_or(0),
            module.line_count(),
            module.short_digest(),
        ),
        Artifact::LoadError(failure) => println!("{} error: {}", failure.module, failure.message),
    }
}
