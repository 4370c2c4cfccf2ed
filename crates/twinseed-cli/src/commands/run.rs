use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use twinseed_engine::config::types::{PartitionStrategyKind, ProvisionConfig};
use twinseed_engine::config::validator;
use twinseed_engine::transform::PlanStats;
use twinseed_engine::{run_provisioning, RunOptions, RunSummary};

/// Command-line settings that take precedence over the provisioning file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub bpns: Vec<String>,
    pub strategy: Option<PartitionStrategyKind>,
    pub parallelism: Option<u32>,
    pub deadline_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut ProvisionConfig) {
        if let Some(input) = self.input {
            config.input = input;
        }
        if !self.bpns.is_empty() {
            config.filter.bpns = self.bpns;
        }
        if let Some(strategy) = self.strategy {
            config.partitioning.strategy = strategy;
        }
        if let Some(parallelism) = self.parallelism {
            config.resources.parallelism = parallelism;
        }
        if let Some(deadline) = self.deadline_secs {
            config.resources.deadline_seconds = Some(deadline);
        }
    }
}

/// Execute the `run` command: parse, override, validate and provision.
pub async fn execute(config_path: &Path, overrides: Overrides, dry_run: bool, json: bool) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    overrides.apply(&mut config);
    validator::validate_config(&config)?;

    tracing::info!(
        run = config.name.as_str(),
        providers = config.providers.len(),
        strategy = ?config.partitioning.strategy,
        "Provisioning config validated"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl+C received, finishing in-flight twins");
            on_signal.cancel();
        }
    });

    let options = RunOptions {
        dry_run,
        deadline: None,
    };
    let summary = run_provisioning(&config, &options, cancel).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?;
        println!("{rendered}");
    } else {
        print_summary(&summary);
    }

    if summary.dry_run || summary.is_clean() {
        Ok(())
    } else {
        anyhow::bail!(
            "Run '{}' finished with {} failed calls and {} unscheduled twins",
            summary.name,
            summary.calls_failed(),
            summary.twins_unscheduled.len()
        )
    }
}

/// Optional planning lines, shown only when their counter is non-zero.
fn plan_notes(plan: &PlanStats) -> Vec<String> {
    let mut notes = Vec::new();
    if plan.unrecognized_keys > 0 {
        notes.push(format!("  Unrecognized:    {} keys skipped", plan.unrecognized_keys));
    }
    if plan.injected_esr > 0 {
        notes.push(format!("  ESR injected:    {} submodels", plan.injected_esr));
    }
    if plan.data_warnings > 0 {
        notes.push(format!("  Data warnings:   {}", plan.data_warnings));
    }
    notes
}

fn print_summary(summary: &RunSummary) {
    let verb = if summary.dry_run { "planned" } else { "finished" };
    println!("Run '{}' {verb} in {:.2}s.", summary.name, summary.duration_secs);
    println!("  Strategy:        {}", summary.strategy);
    println!(
        "  Records:         {} ({} filtered, {} merged)",
        summary.plan.records, summary.plan.filtered_records, summary.plan.merged_records
    );
    println!("  Twins planned:   {}", summary.twins_planned);
    println!("  Submodels:       {}", summary.submodels_planned);
    for routing in &summary.routed {
        println!("    {:14} {}", format!("{}:", routing.target), routing.submodels);
    }
    for line in plan_notes(&summary.plan) {
        println!("{line}");
    }
    if summary.dry_run {
        return;
    }

    println!("  Twins published: {}", summary.twins_published);
    if !summary.twins_incomplete.is_empty() {
        println!("  Twins incomplete: {}", summary.twins_incomplete.len());
    }
    if summary.cancelled {
        println!("  Stopped early:   {} twins unscheduled", summary.twins_unscheduled.len());
    }
    println!(
        "  Setup calls:     {} ok, {} failed",
        summary.setup.succeeded, summary.setup.failed
    );
    println!("  Calls by kind:");
    for (kind, stats) in &summary.by_kind {
        println!("    {:20} {} ok, {} failed", format!("{kind}:"), stats.succeeded, stats.failed);
    }
    println!("  Calls by target:");
    for (target, stats) in &summary.by_target {
        println!("    {:20} {} ok, {} failed", format!("{target}:"), stats.succeeded, stats.failed);
    }
    for failure in &summary.failures {
        let status = failure
            .status
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "  FAILED {} {} [{}] {} {}",
            failure.artifact,
            failure.entity_id,
            failure.target.as_deref().unwrap_or("registry"),
            failure.outcome,
            status
        );
    }
}
