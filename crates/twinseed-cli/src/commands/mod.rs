pub mod check;
pub mod reset;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use twinseed_engine::config::parser;
use twinseed_engine::config::types::ProvisionConfig;

/// Parse the provisioning file without validating it.
fn load_config(config_path: &Path) -> Result<ProvisionConfig> {
    parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse provisioning file: {}", config_path.display()))
}
