//! Shared setup for the subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use scriptflow_intent::FlowCatalog;
use scriptflow_runner::RunnerConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Load the flow catalog from `path`, or the built-in one.
pub fn load_catalog(path: Option<&Path>) -> Result<FlowCatalog> {
    match path {
        Some(path) => FlowCatalog::load(path)
            .with_context(|| format!("failed to load flow catalog from {}", path.display())),
        None => {
            info!("using built-in flow catalog");
            Ok(FlowCatalog::builtin())
        }
    }
}

/// Load the runner config, then apply `SCRIPTFLOW_SPEED` and `--speed`.
pub fn load_config(path: &Path, speed: Option<f64>) -> Result<RunnerConfig> {
    let config = RunnerConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?
        .apply_env()
        .context("invalid SCRIPTFLOW_SPEED")?;

    match speed {
        Some(speed) => config.with_speed(speed).context("invalid --speed"),
        None => Ok(config),
    }
}
