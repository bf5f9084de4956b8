// src/engine/lifecycle.rs

use std::io::Write;

use tracing::{error, info};

use crate::config::RestartConfig;
use crate::engine::settle::SettleReport;

/// What happens when a change reaches a module nobody depends on.
///
/// Called at most once per settle pass, once the pass has finished and
/// before its report is published.
pub trait Lifecycle: Send + Sync + 'static {
    fn restart_required(&self, report: &SettleReport);
}

/// Ends the process so it can be started again with fresh code.
///
/// Under a supervisor (signalled by an environment variable) the agreed
/// message is written to stdout and the process exits cleanly. Standalone,
/// an error is logged and the process exits with the configured code.
#[derive(Debug, Clone)]
pub struct ProcessLifecycle {
    supervised: bool,
    exit_code: i32,
    message: String,
}

impl ProcessLifecycle {
    pub fn from_config(config: &RestartConfig) -> Self {
        Self {
            supervised: std::env::var_os(&config.supervisor_env).is_some(),
            exit_code: config.exit_code,
            message: config.message.clone(),
        }
    }

    pub fn is_supervised(&self) -> bool {
        self.supervised
    }
}

impl Lifecycle for ProcessLifecycle {
    fn restart_required(&self, report: &SettleReport) {
        let roots: Vec<&str> = report.unhandled_roots.iter().map(|id| id.as_str()).collect();

        if self.supervised {
            info!(?roots, "requesting restart from supervisor");
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{}", self.message);
            let _ = out.flush();
            std::process::exit(0);
        }

        error!(?roots, exit_code = self.exit_code, "restart required by code changes");
        let _ = std::io::stderr().flush();
        std::process::exit(self.exit_code);
    }
}
