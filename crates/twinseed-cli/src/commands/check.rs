use std::path::Path;

use anyhow::Result;
use twinseed_engine::config::validator;
use twinseed_engine::TestDataDocument;

/// Execute the `check` command: validate the config and plan the input offline.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = super::load_config(config_path)?;
    validator::validate_config(&config)?;
    println!("Configuration:     OK");

    let document = TestDataDocument::load(&config.input)?;
    println!(
        "Test data:         OK ({} records, {} policy templates)",
        document.records().len(),
        document.policies().len()
    );

    let summary = twinseed_engine::plan_summary(&config, &document)?;
    println!(
        "Plan:              {} twins, {} submodels ({})",
        summary.twins_planned, summary.submodels_planned, summary.strategy
    );
    for routing in &summary.routed {
        println!("  {:16} {} submodels", format!("{}:", routing.target), routing.submodels);
    }
    if summary.plan.unrecognized_keys > 0 {
        println!(
            "  {} unrecognized record keys will be skipped",
            summary.plan.unrecognized_keys
        );
    }

    println!("\nAll checks passed.");
    Ok(())
}
