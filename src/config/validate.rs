// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{EngineConfig, RawConfigFile, RestartConfig};
use crate::errors::{HotError, Result};
use crate::watch::patterns::ExcludeSet;

const MAX_DEBOUNCE_MS: u64 = 10_000;

impl TryFrom<RawConfigFile> for EngineConfig {
    type Error = HotError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let exclude = ExcludeSet::new(&raw.watch.exclude)?;
        let exit_code = i32::try_from(raw.restart.exit_code)
            .map_err(|_| HotError::ConfigError("[restart].exit_code out of range".to_string()))?;

        Ok(EngineConfig {
            watch_enabled: raw.watch.enabled,
            debounce: Duration::from_millis(raw.watch.debounce_ms),
            exclude,
            use_hash: raw.watch.use_hash,
            restart: RestartConfig {
                exit_code,
                supervisor_env: raw.restart.supervisor_env,
                message: raw.restart.message,
            },
        })
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watch_section(cfg)?;
    validate_restart_section(cfg)?;
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    let debounce = cfg.watch.debounce_ms;
    if debounce == 0 || debounce > MAX_DEBOUNCE_MS {
        return Err(HotError::ConfigError(format!(
            "[watch].debounce_ms must be in 1..={MAX_DEBOUNCE_MS} (got {debounce})"
        )));
    }
    Ok(())
}

fn validate_restart_section(cfg: &RawConfigFile) -> Result<()> {
    let restart = &cfg.restart;
    if !(0..=255).contains(&restart.exit_code) {
        return Err(HotError::ConfigError(format!(
            "[restart].exit_code must be in 0..=255 (got {})",
            restart.exit_code
        )));
    }
    if restart.supervisor_env.trim().is_empty() {
        return Err(HotError::ConfigError(
            "[restart].supervisor_env must not be empty".to_string(),
        ));
    }
    if restart.supervisor_env.contains('=') {
        return Err(HotError::ConfigError(format!(
            "[restart].supervisor_env is not a valid variable name: {:?}",
            restart.supervisor_env
        )));
    }
    if restart.message.trim().is_empty() || restart.message.contains('\n') {
        return Err(HotError::ConfigError(
            "[restart].message must be a single non-empty line".to_string(),
        ));
    }
    Ok(())
}
