//! CLI command implementations.

pub mod check;
pub mod generate;

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use flatpress_core::Config;

/// Load the site configuration, with environment overrides.
pub(crate) fn load_config(config_path: &Path) -> Result<Config> {
    let config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}
