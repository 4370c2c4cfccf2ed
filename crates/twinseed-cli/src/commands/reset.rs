use std::path::Path;

use anyhow::{Context, Result};
use twinseed_engine::config::validator;
use twinseed_engine::reset_environment;

/// Execute the `reset` command: delete every provisioned artifact.
pub async fn execute(config_path: &Path, json: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    validator::validate_config(&config)?;

    tracing::info!(
        run = config.name.as_str(),
        providers = config.providers.len(),
        "Resetting environment"
    );
    let summary = reset_environment(&config).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&summary).context("Failed to serialize reset summary")?;
        println!("{rendered}");
    } else {
        println!("Reset finished in {:.2}s.", summary.duration_secs);
        for collection in &summary.collections {
            let state = if collection.converged { "empty" } else { "NOT EMPTY" };
            println!(
                "  {:28} {:9} {} deleted, {} failed, {} rounds",
                format!("{}:", collection.collection),
                state,
                collection.deleted,
                collection.failed,
                collection.rounds
            );
            if let Some(ref detail) = collection.detail {
                println!("    {detail}");
            }
        }
    }

    if summary.converged() {
        Ok(())
    } else {
        anyhow::bail!(
            "Reset left {} collection(s) non-empty",
            summary.collections.iter().filter(|c| !c.converged).count()
        )
    }
}
