// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `hotgraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hotgraph",
    version,
    about = "Load a module, keep it up to date as files change, restart when nothing can take a change.",
    long_about = None
)]
pub struct CliArgs {
    /// Entry module to load and follow.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Path to the config file (TOML).
    ///
    /// Default: `Hotgraph.toml` in the current working directory. A missing
    /// default file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Hotgraph.toml")]
    pub config: String,

    /// Override `[watch].debounce_ms`.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOTGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the dependency graph (Graphviz DOT) after every settle pass.
    #[arg(long)]
    pub print_graph: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_and_flags() {
        let args = CliArgs::try_parse_from([
            "hotgraph",
            "app/main.txt",
            "--debounce-ms",
            "20",
            "--log-level",
            "debug",
            "--print-graph",
        ])
        .unwrap();
        assert_eq!(args.file, PathBuf::from("app/main.txt"));
        assert_eq!(args.config, "Hotgraph.toml");
        assert_eq!(args.debounce_ms, Some(20));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(args.print_graph);
    }

    #[test]
    fn file_is_required() {
        assert!(CliArgs::try_parse_from(["hotgraph"]).is_err());
    }
}
