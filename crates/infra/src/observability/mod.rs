//! Tracing subscriber initialisation

use cleanplayer_domain::{CleanPlayerError, LoggingConfig, Result};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber described by `config`
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. Returns
/// `Ok(false)` if a global subscriber was already installed.
///
/// # Errors
/// Returns `CleanPlayerError::Config` if the level is not a valid filter
/// directive.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json {
        builder.json().with_current_span(false).try_init().is_ok()
    } else {
        builder.compact().try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Tracing initialised");
    }
    Ok(installed)
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| {
        CleanPlayerError::Config(format!("Invalid log level '{}': {e}", config.level))
    })
}
