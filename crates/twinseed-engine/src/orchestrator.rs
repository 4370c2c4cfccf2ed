//! Run orchestrator: plan, shared setup, twin publication and summary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ProvisionConfig;
use crate::document::TestDataDocument;
use crate::errors::ProvisionError;
use crate::ids::{IdSource, RandomIds};
use crate::publisher::Publisher;
use crate::result::{RunSummary, TargetRouting, TwinOutcome};
use crate::setup::SetupStage;
use crate::transform::{Plan, RunState, TwinPlan, Transformer};
use crate::transport::{HttpTransport, Transport};

/// Per-invocation switches that are not part of the provisioning file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Plan only; send nothing.
    pub dry_run: bool,
    /// Overrides `resources.deadline_seconds`.
    pub deadline: Option<Duration>,
}

/// Load the configured document, plan it and publish it over HTTP.
///
/// # Errors
///
/// Returns a `ProvisionError` if the document is structurally invalid or the
/// run cannot be set up. Publication failures never abort the run; they are
/// reported in the summary.
pub async fn run_provisioning(
    config: &ProvisionConfig,
    options: &RunOptions,
    cancel: CancellationToken,
) -> Result<RunSummary, ProvisionError> {
    tracing::info!(
        run = config.name.as_str(),
        input = %config.input.display(),
        providers = config.providers.len(),
        dry_run = options.dry_run,
        "Starting provisioning run"
    );
    let document = TestDataDocument::load(&config.input)?;

    if options.dry_run {
        return plan_summary(config, &document);
    }

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
    run_with_transport(config, &document, transport, Box::new(RandomIds), options, cancel).await
}

/// Plan `document` without contacting any service.
///
/// # Errors
///
/// Returns a `ProvisionError` if the partitioning config cannot be resolved.
pub fn plan_summary(
    config: &ProvisionConfig,
    document: &TestDataDocument,
) -> Result<RunSummary, ProvisionError> {
    plan_run(config, document, Box::new(RandomIds), Instant::now()).map(|(summary, _)| summary)
}

/// Plan and publish `document` through `transport`.
///
/// # Errors
///
/// Returns a `ProvisionError` if planning fails or a publication task panics.
pub async fn run_with_transport(
    config: &ProvisionConfig,
    document: &TestDataDocument,
    transport: Arc<dyn Transport>,
    ids: Box<dyn IdSource>,
    options: &RunOptions,
    cancel: CancellationToken,
) -> Result<RunSummary, ProvisionError> {
    let start = Instant::now();
    let deadline = options
        .deadline
        .or_else(|| config.resources.deadline_seconds.map(Duration::from_secs))
        .map(|d| start + d);

    let (mut summary, prepared) = plan_run(config, document, ids, start)?;
    summary.dry_run = options.dry_run;
    if options.dry_run {
        return Ok(summary);
    }
    let Prepared { transformer, plan } = prepared;

    if cancel.is_cancelled() {
        summary.cancelled = true;
        summary.twins_unscheduled = plan
            .twins
            .iter()
            .map(|t| t.twin.global_asset_id.to_string())
            .collect();
        summary.duration_secs = start.elapsed().as_secs_f64();
        return Ok(summary);
    }

    let setup_results = SetupStage {
        transport: transport.as_ref(),
        schema: transformer.connector_schema().as_ref(),
        config,
        templates: transformer.templates(),
    }
    .run()
    .await;
    for result in setup_results {
        summary.record_setup(result);
    }

    let publisher = Publisher::new(transport, config);
    let parallelism = usize::try_from(config.resources.parallelism.max(1)).unwrap_or(1);
    let execution = execute_twins(plan.twins, publisher, parallelism, &cancel, deadline).await?;

    summary.cancelled = execution.stopped_early;
    summary.twins_unscheduled = execution.unscheduled;
    for outcome in execution.outcomes {
        summary.record_twin(outcome);
    }
    summary.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        run = summary.name.as_str(),
        twins_published = summary.twins_published,
        twins_incomplete = summary.twins_incomplete.len(),
        twins_unscheduled = summary.twins_unscheduled.len(),
        calls_failed = summary.calls_failed(),
        duration_secs = summary.duration_secs,
        "Provisioning run finished"
    );
    Ok(summary)
}

struct Prepared {
    transformer: Transformer,
    plan: Plan,
}

fn plan_run(
    config: &ProvisionConfig,
    document: &TestDataDocument,
    ids: Box<dyn IdSource>,
    start: Instant,
) -> Result<(RunSummary, Prepared), ProvisionError> {
    let started_at = Utc::now();
    let transformer = Transformer::new(config, document.policies())?;
    let mut state = RunState::new(ids, transformer.targets().len());
    let plan = transformer.plan(document, &mut state)?;

    let mut summary = RunSummary::new(
        config.name.clone(),
        started_at,
        transformer.partitioner().strategy_name(),
    );
    summary.dry_run = true;
    summary.plan = plan.stats.clone();
    summary.twins_planned = plan.twins.len();
    summary.submodels_planned = plan.submodel_count();
    summary.routed = transformer
        .targets()
        .iter()
        .zip(state.routed())
        .map(|(target, &submodels)| TargetRouting {
            target: target.name.clone(),
            submodels,
        })
        .collect();
    summary.duration_secs = start.elapsed().as_secs_f64();

    Ok((summary, Prepared { transformer, plan }))
}

struct TwinExecution {
    /// Outcomes in plan order.
    outcomes: Vec<TwinOutcome>,
    unscheduled: Vec<String>,
    stopped_early: bool,
}

fn stop_reason(cancel: &CancellationToken, deadline: Option<Instant>) -> Option<&'static str> {
    if cancel.is_cancelled() {
        Some("cancelled")
    } else if deadline.is_some_and(|d| Instant::now() >= d) {
        Some("deadline reached")
    } else {
        None
    }
}

enum Slot {
    Ready(OwnedSemaphorePermit),
    Stop(&'static str),
}

/// Resolves at `deadline`, or never when there is none.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}

/// Wait for a free publication slot, giving up on cancellation or at the deadline.
async fn next_slot(
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<Slot, ProvisionError> {
    let permit = tokio::select! {
        permit = semaphore.clone().acquire_owned() => permit.map_err(|e| {
            ProvisionError::Infrastructure(anyhow::anyhow!("Semaphore closed: {e}"))
        })?,
        () = cancel.cancelled() => return Ok(Slot::Stop("cancelled")),
        () = until(deadline) => return Ok(Slot::Stop("deadline reached")),
    };

    // select! picks among ready branches at random; a slot may win a tie.
    Ok(match stop_reason(cancel, deadline) {
        Some(reason) => Slot::Stop(reason),
        None => Slot::Ready(permit),
    })
}

async fn execute_twins(
    twins: Vec<TwinPlan>,
    publisher: Publisher,
    parallelism: usize,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<TwinExecution, ProvisionError> {
    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut join_set: JoinSet<(usize, TwinOutcome)> = JoinSet::new();
    let mut unscheduled = Vec::new();
    let mut stopped_early = false;

    let mut pending = twins.into_iter().enumerate();
    while let Some((index, twin)) = pending.next() {
        let permit = match next_slot(&semaphore, cancel, deadline).await? {
            Slot::Ready(permit) => permit,
            Slot::Stop(reason) => {
                stopped_early = true;
                unscheduled.push(twin.twin.global_asset_id.to_string());
                unscheduled.extend(pending.by_ref().map(|(_, t)| t.twin.global_asset_id.to_string()));
                tracing::warn!(
                    reason,
                    unscheduled = unscheduled.len(),
                    "Stopped scheduling twins; in-flight twins will finish"
                );
                break;
            }
        };

        let publisher = publisher.clone();
        join_set.spawn(async move {
            let _permit = permit;
            (index, publisher.publish_twin(&twin).await)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(indexed) => outcomes.push(indexed),
            Err(join_err) => {
                join_set.abort_all();
                return Err(ProvisionError::Infrastructure(anyhow::anyhow!(
                    "Twin task panicked: {join_err}"
                )));
            }
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    Ok(TwinExecution {
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
        unscheduled,
        stopped_early,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;
    use crate::document::CONTAINER_KEY;
    use crate::errors::Method;
    use crate::ids::SequentialIds;
    use crate::testing::RecordingTransport;
    use serde_json::json;
    use twinseed_types::ArtifactKind;

    const SERIAL_PART: &str = "urn:bamm:io.catenax.serial_part:1.0.0#SerialPart";

    fn config(extra: &str) -> ProvisionConfig {
        parse_config_str(&format!(
            r#"
version: "1.0"
name: orchestrator_test
input: testdata.json
registry:
  url: http://registry
connector:
  api_key: key
providers:
  - name: a
    submodel_url: http://sm-a
    connector_url: http://edc-a
  - name: b
    submodel_url: http://sm-b
    connector_url: http://edc-b
partitioning:
  strategy: round_robin
setup:
  policies: false
  registry_asset: false
{extra}"#
        ))
        .unwrap()
    }

    fn document(twins: usize) -> TestDataDocument {
        let records: Vec<_> = (0..twins)
            .map(|i| {
                json!({
                    "catenaXId": format!("urn:uuid:{i}"),
                    "bpnl": "BPNL1",
                    SERIAL_PART: [{"partTypeInformation": {"nameAtManufacturer": format!("part {i}")}}]
                })
            })
            .collect();
        TestDataDocument::from_value(&json!({ CONTAINER_KEY: records })).unwrap()
    }

    async fn run(
        config: &ProvisionConfig,
        document: &TestDataDocument,
        transport: Arc<RecordingTransport>,
        options: &RunOptions,
        cancel: CancellationToken,
    ) -> RunSummary {
        run_with_transport(
            config,
            document,
            transport,
            Box::new(SequentialIds::new("urn:test:")),
            options,
            cancel,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn publishes_every_twin_and_counts_results() {
        let config = config("");
        let transport = Arc::new(RecordingTransport::new());
        let summary = run(
            &config,
            &document(3),
            transport.clone(),
            &RunOptions::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(summary.twins_planned, 3);
        assert_eq!(summary.twins_published, 3);
        assert_eq!(summary.submodels_planned, 3);
        assert_eq!(summary.by_kind[&ArtifactKind::Shell].succeeded, 3);
        assert_eq!(summary.by_kind[&ArtifactKind::Submodel].succeeded, 3);
        assert_eq!(summary.routed[0].submodels, 2);
        assert_eq!(summary.routed[1].submodels, 1);
        assert_eq!(summary.by_target["a"].succeeded, 8);
        assert_eq!(summary.by_target["b"].succeeded, 4);
        assert!(summary.is_clean());
        assert_eq!(transport.requests().len(), 15);
    }

    #[tokio::test]
    async fn one_twin_with_two_aspects_spreads_over_two_targets() {
        let config = config("");
        let document = TestDataDocument::from_value(&json!({ CONTAINER_KEY: [{
            "catenaXId": "urn:uuid:AAA",
            "bpnl": "BPNL1",
            SERIAL_PART: [{"partTypeInformation": {"nameAtManufacturer": "Gearbox"}}],
            "urn:bamm:com.catenax.assembly_part_relationship:1.0.0#AssemblyRelationship": [{
                "catenaXId": "urn:uuid:AAA",
                "childParts": []
            }]
        }]}))
        .unwrap();
        let transport = Arc::new(RecordingTransport::new());

        let summary = run(
            &config,
            &document,
            transport.clone(),
            &RunOptions::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(summary.twins_published, 1);
        assert_eq!(summary.submodels_planned, 2);
        assert_eq!(summary.routed[0].submodels, 1);
        assert_eq!(summary.routed[1].submodels, 1);

        let calls = transport.calls();
        let count = |needle: &str| calls.iter().filter(|c| c.contains(needle)).count();
        assert_eq!(count("/data/"), 2);
        assert_eq!(count("http://sm-a/data/"), 1);
        assert_eq!(count("http://sm-b/data/"), 1);
        assert_eq!(count("/assets"), 2);
        assert_eq!(count("/policydefinitions"), 2);
        assert_eq!(count("/contractdefinitions"), 2);
        assert_eq!(count("shell-descriptors"), 1);
        assert!(calls.last().unwrap().contains("shell-descriptors"));
    }

    #[tokio::test]
    async fn failed_artifacts_mark_twin_incomplete() {
        let config = config("");
        let transport = Arc::new(RecordingTransport::new().status_for(
            Method::Post,
            "http://edc-b/management/v2/assets",
            500,
            "boom",
        ));
        let summary = run(
            &config,
            &document(2),
            transport,
            &RunOptions::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(summary.twins_published, 1);
        assert_eq!(summary.twins_incomplete, vec!["urn:uuid:1"]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].detail.as_deref(), Some("boom"));
        assert_eq!(summary.by_target["b"].failed, 1);
    }

    #[tokio::test]
    async fn dry_run_sends_nothing() {
        let config = config("");
        let transport = Arc::new(RecordingTransport::new());
        let summary = run(
            &config,
            &document(2),
            transport.clone(),
            &RunOptions {
                dry_run: true,
                deadline: None,
            },
            CancellationToken::new(),
        )
        .await;

        assert!(summary.dry_run);
        assert_eq!(summary.twins_planned, 2);
        assert_eq!(summary.twins_published, 0);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_lists_unscheduled_twins() {
        let config = config("");
        let transport = Arc::new(RecordingTransport::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run(&config, &document(3), transport.clone(), &RunOptions::default(), cancel).await;

        assert!(summary.cancelled);
        assert_eq!(
            summary.twins_unscheduled,
            vec!["urn:uuid:0", "urn:uuid:1", "urn:uuid:2"]
        );
        assert!(transport.requests().is_empty());
        assert!(!summary.is_clean());
    }

    #[tokio::test]
    async fn expired_deadline_stops_scheduling() {
        let config = config("resources:\n  parallelism: 2\n");
        let transport = Arc::new(RecordingTransport::new());
        let summary = run(
            &config,
            &document(4),
            transport,
            &RunOptions {
                dry_run: false,
                deadline: Some(Duration::ZERO),
            },
            CancellationToken::new(),
        )
        .await;

        assert!(summary.cancelled);
        assert_eq!(summary.twins_unscheduled.len(), 4);
        assert_eq!(summary.twins_published, 0);
    }

    #[tokio::test]
    async fn deadline_ends_the_wait_for_a_busy_slot() {
        let semaphore = Arc::new(Semaphore::new(1));
        let _in_flight = semaphore.clone().acquire_owned().await.unwrap();
        let deadline = Instant::now() + Duration::from_millis(20);

        let slot = tokio::time::timeout(
            Duration::from_secs(5),
            next_slot(&semaphore, &CancellationToken::new(), Some(deadline)),
        )
        .await
        .expect("deadline should end the wait while the only slot is held")
        .unwrap();

        assert!(matches!(slot, Slot::Stop("deadline reached")));
    }

    #[tokio::test]
    async fn free_slot_is_granted_before_the_deadline() {
        let semaphore = Arc::new(Semaphore::new(1));
        let deadline = Instant::now() + Duration::from_secs(60);

        let slot = next_slot(&semaphore, &CancellationToken::new(), Some(deadline))
            .await
            .unwrap();

        assert!(matches!(slot, Slot::Ready(_)));
        assert_eq!(semaphore.available_permits(), 0);
    }

    #[test]
    fn empty_provider_list_is_an_error_not_a_panic() {
        let config = parse_config_str(
            r#"
version: "1.0"
name: no_providers
input: testdata.json
registry:
  url: http://registry
connector:
  api_key: key
providers: []
"#,
        )
        .unwrap();

        let err = plan_summary(&config, &document(1)).unwrap_err();
        assert!(matches!(err, ProvisionError::Infrastructure(_)));
        assert!(err.to_string().contains("At least one provider"), "{err}");
    }

    #[tokio::test]
    async fn empty_provider_list_fails_before_sending() {
        let mut config = config("");
        config.providers.clear();
        let transport = Arc::new(RecordingTransport::new());

        let result = run_with_transport(
            &config,
            &document(2),
            transport.clone(),
            Box::new(SequentialIds::new("urn:test:")),
            &RunOptions::default(),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn parallel_publication_keeps_plan_order_in_summary() {
        let config = config("resources:\n  parallelism: 4\n");
        let transport = Arc::new(RecordingTransport::new().status_for(
            Method::Post,
            "/registry/shell-descriptors",
            400,
            "bad shell",
        ));
        let summary = run(
            &config,
            &document(5),
            transport,
            &RunOptions::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(
            summary.twins_incomplete,
            vec!["urn:uuid:0", "urn:uuid:1", "urn:uuid:2", "urn:uuid:3", "urn:uuid:4"]
        );
    }

    #[tokio::test]
    async fn setup_results_are_counted_separately() {
        let mut config = config("");
        config.setup.policies = true;
        let transport = Arc::new(RecordingTransport::new());
        let summary = run(
            &config,
            &document(1),
            transport,
            &RunOptions::default(),
            CancellationToken::new(),
        )
        .await;

        // `{}` from the policy lookup means "missing", so both connectors get a create.
        assert_eq!(summary.setup.succeeded, 2);
        assert_eq!(summary.by_kind[&ArtifactKind::Policy].succeeded, 3);
    }
}
