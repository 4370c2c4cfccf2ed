//! Run and reset result types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use twinseed_types::{ArtifactKind, PublishResult};

use crate::transform::PlanStats;

/// Target name used for registry calls in per-target statistics.
pub const REGISTRY_TARGET: &str = "registry";

/// Succeeded / failed call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub succeeded: usize,
    pub failed: usize,
}

impl CallStats {
    fn record(&mut self, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Results of publishing one twin.
#[derive(Debug, Clone, Serialize)]
pub struct TwinOutcome {
    pub catenax_id: String,
    pub shell_id: String,
    pub results: Vec<PublishResult>,
}

impl TwinOutcome {
    /// All artifacts of the twin were accepted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(PublishResult::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PublishResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Submodels routed to one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRouting {
    pub target: String,
    pub submodels: usize,
}

/// Aggregate result of a provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub strategy: String,
    pub dry_run: bool,
    pub cancelled: bool,
    pub plan: PlanStats,
    pub twins_planned: usize,
    pub twins_published: usize,
    pub submodels_planned: usize,
    pub routed: Vec<TargetRouting>,
    /// Twins with at least one failed artifact.
    pub twins_incomplete: Vec<String>,
    /// Twins never scheduled because the run was cancelled or hit its deadline.
    pub twins_unscheduled: Vec<String>,
    pub by_kind: BTreeMap<ArtifactKind, CallStats>,
    pub by_target: BTreeMap<String, CallStats>,
    /// Shared setup calls (policies, registry asset).
    pub setup: CallStats,
    pub failures: Vec<PublishResult>,
}

impl RunSummary {
    #[must_use]
    pub fn new(name: impl Into<String>, started_at: DateTime<Utc>, strategy: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at,
            duration_secs: 0.0,
            strategy: strategy.into(),
            dry_run: false,
            cancelled: false,
            plan: PlanStats::default(),
            twins_planned: 0,
            twins_published: 0,
            submodels_planned: 0,
            routed: Vec::new(),
            twins_incomplete: Vec::new(),
            twins_unscheduled: Vec::new(),
            by_kind: BTreeMap::new(),
            by_target: BTreeMap::new(),
            setup: CallStats::default(),
            failures: Vec::new(),
        }
    }

    /// Fold one twin's results into the totals.
    pub fn record_twin(&mut self, outcome: TwinOutcome) {
        if outcome.is_complete() {
            self.twins_published += 1;
        } else {
            self.twins_incomplete.push(outcome.catenax_id.clone());
        }
        for result in outcome.results {
            self.record_call(result);
        }
    }

    /// Fold one shared-setup call into the totals.
    pub fn record_setup(&mut self, result: PublishResult) {
        self.setup.record(result.is_success());
        self.record_call(result);
    }

    fn record_call(&mut self, result: PublishResult) {
        let success = result.is_success();
        self.by_kind.entry(result.artifact).or_default().record(success);
        let target = result
            .target
            .clone()
            .unwrap_or_else(|| REGISTRY_TARGET.to_string());
        self.by_target.entry(target).or_default().record(success);
        if !success {
            self.failures.push(result);
        }
    }

    #[must_use]
    pub fn calls_succeeded(&self) -> usize {
        self.by_kind.values().map(|s| s.succeeded).sum()
    }

    #[must_use]
    pub fn calls_failed(&self) -> usize {
        self.by_kind.values().map(|s| s.failed).sum()
    }

    /// Every planned twin was published completely.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.twins_unscheduled.is_empty() && !self.cancelled
    }
}

/// Outcome of emptying one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionReset {
    /// Human-readable collection label, e.g. `provider-a/assets`.
    pub collection: String,
    pub url: String,
    pub rounds: u32,
    pub deleted: usize,
    pub failed: usize,
    /// The final listing was empty.
    pub converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate result of an environment reset.
#[derive(Debug, Clone, Serialize)]
pub struct ResetSummary {
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub collections: Vec<CollectionReset>,
}

impl ResetSummary {
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.collections.iter().map(|c| c.deleted).sum()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.collections.iter().map(|c| c.failed).sum()
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.collections.iter().all(|c| c.converged)
    }
}
