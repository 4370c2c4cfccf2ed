//! Environment reset: list-then-delete until every collection is empty.
//!
//! Collections are drained in dependency order: registry shells first, then on
//! each connector contract definitions, policy definitions and assets.

use std::time::Instant;

use chrono::Utc;
use serde_json::Value;

use crate::config::ProvisionConfig;
use crate::errors::ProvisionError;
use crate::publisher::{ManagementApi, ManagementCollection};
use crate::result::{CollectionReset, ResetSummary};
use crate::schema::{listed_connector_id, RegistrySchema};
use crate::transport::{HttpTransport, Request, Service, Transport};

/// Highest status a delete may answer with and still count as done.
const DELETE_OK_MAX_STATUS: u16 = 205;

/// Remove every shell, contract definition, policy definition and asset
/// reachable through `config`.
///
/// # Errors
///
/// Returns a `ProvisionError` if the HTTP client cannot be built. Failed
/// deletes and listings are reported in the summary instead.
pub async fn reset_environment(config: &ProvisionConfig) -> Result<ResetSummary, ProvisionError> {
    let transport = HttpTransport::from_config(config)?;
    Ok(reset_with_transport(config, &transport).await)
}

/// Reset through an arbitrary transport.
pub async fn reset_with_transport(config: &ProvisionConfig, transport: &dyn Transport) -> ResetSummary {
    let start = Instant::now();
    let started_at = Utc::now();
    let max_rounds = config.resources.reset_max_rounds;
    let mut collections = Vec::new();

    let registry = RegistrySchema::new(config.registry.schema);
    let shells = config.registry.descriptors_url();
    collections.push(
        Drain {
            collection: "registry/shells".to_string(),
            list_url: format!("{shells}?pageSize={}", config.registry.page_size),
            delete_base: shells,
            service: Service::Registry,
            max_rounds,
        }
        .run(transport, |page| registry.listed_shell_ids(page))
        .await,
    );

    let management = ManagementApi::new(config.connector.management_path.clone());
    for target in config.targets() {
        for collection in [
            ManagementCollection::ContractDefinitions,
            ManagementCollection::PolicyDefinitions,
            ManagementCollection::Assets,
        ] {
            let url = management.url(&target.connector_upload_url, collection);
            collections.push(
                Drain {
                    collection: format!("{}/{}", target.name, collection.path()),
                    list_url: url.clone(),
                    delete_base: url,
                    service: Service::Connector,
                    max_rounds,
                }
                .run(transport, connector_listing_ids)
                .await,
            );
        }
    }

    let summary = ResetSummary {
        started_at,
        duration_secs: start.elapsed().as_secs_f64(),
        collections,
    };
    tracing::info!(
        deleted = summary.deleted(),
        failed = summary.failed(),
        converged = summary.converged(),
        "Environment reset finished"
    );
    summary
}

fn connector_listing_ids(listing: &Value) -> Vec<String> {
    listing
        .as_array()
        .map(|entries| entries.iter().filter_map(listed_connector_id).collect())
        .unwrap_or_default()
}

struct Drain {
    collection: String,
    list_url: String,
    delete_base: String,
    service: Service,
    max_rounds: u32,
}

impl Drain {
    async fn run(
        self,
        transport: &dyn Transport,
        extract: impl Fn(&Value) -> Vec<String>,
    ) -> CollectionReset {
        let mut reset = CollectionReset {
            collection: self.collection,
            url: self.list_url,
            rounds: 0,
            deleted: 0,
            failed: 0,
            converged: false,
            detail: None,
        };

        loop {
            let listing = Request::get(self.service, reset.url.clone());
            let ids = match transport.send(&listing).await.result {
                Ok(response) if response.is_success() => match response.json() {
                    Some(page) => extract(&page),
                    None => {
                        reset.detail = Some("listing response is not JSON".to_string());
                        break;
                    }
                },
                Ok(response) => {
                    reset.detail = Some(format!("listing returned HTTP {}", response.status));
                    break;
                }
                Err(err) => {
                    reset.detail = Some(format!("listing failed: {err}"));
                    break;
                }
            };

            if ids.is_empty() {
                reset.converged = true;
                break;
            }
            if reset.rounds >= self.max_rounds {
                reset.detail = Some(format!("round limit of {} reached", self.max_rounds));
                break;
            }
            reset.rounds += 1;

            let mut deleted_this_round = 0usize;
            for id in ids {
                let delete = Request::delete(self.service, format!("{}/{id}", self.delete_base));
                match transport.send(&delete).await.result {
                    Ok(response) if (200..=DELETE_OK_MAX_STATUS).contains(&response.status) => {
                        deleted_this_round += 1;
                    }
                    Ok(response) => {
                        reset.failed += 1;
                        tracing::warn!(
                            collection = reset.collection.as_str(),
                            id = id.as_str(),
                            status = response.status,
                            body = response.body.as_str(),
                            "Delete rejected"
                        );
                    }
                    Err(err) => {
                        reset.failed += 1;
                        tracing::warn!(
                            collection = reset.collection.as_str(),
                            id = id.as_str(),
                            error = %err,
                            "Delete failed"
                        );
                    }
                }
            }
            reset.deleted += deleted_this_round;

            if deleted_this_round == 0 {
                reset.detail = Some("no delete succeeded in a round".to_string());
                break;
            }
        }

        if reset.converged {
            tracing::info!(
                collection = reset.collection.as_str(),
                deleted = reset.deleted,
                rounds = reset.rounds,
                "Collection emptied"
            );
        } else {
            tracing::warn!(
                collection = reset.collection.as_str(),
                deleted = reset.deleted,
                failed = reset.failed,
                detail = reset.detail.as_deref(),
                "Collection not emptied"
            );
        }
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;
    use crate::errors::Method;
    use crate::testing::RecordingTransport;
    use crate::transport::Response;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(extra: &str) -> ProvisionConfig {
        parse_config_str(&format!(
            r#"
version: "1.0"
name: reset_test
input: testdata.json
registry:
  url: http://registry
  page_size: 2
connector:
  api_key: key
providers:
  - name: a
    submodel_url: http://sm-a
    connector_url: http://edc-a
{extra}"#
        ))
        .unwrap()
    }

    fn ok(body: &str) -> Option<Result<Response, crate::errors::TransportError>> {
        Some(Ok(Response {
            status: 200,
            body: body.to_string(),
        }))
    }

    #[tokio::test]
    async fn empty_environment_converges_immediately() {
        let transport = RecordingTransport::new()
            .status_for(Method::Get, "shell-descriptors", 200, r#"{"items": []}"#)
            .status_for(Method::Get, "/management/", 200, "[]");

        let summary = reset_with_transport(&config(""), &transport).await;

        assert_eq!(summary.collections.len(), 4);
        assert!(summary.converged());
        assert_eq!(summary.deleted(), 0);
        assert_eq!(
            transport.calls(),
            vec![
                "GET http://registry/registry/shell-descriptors?pageSize=2",
                "GET http://edc-a/management/v2/contractdefinitions",
                "GET http://edc-a/management/v2/policydefinitions",
                "GET http://edc-a/management/v2/assets",
            ]
        );
    }

    #[tokio::test]
    async fn paginated_shells_are_drained_until_listing_is_empty() {
        let pages = Arc::new(AtomicUsize::new(0));
        let counter = pages.clone();
        let transport = RecordingTransport::new()
            .respond(move |req| {
                if req.method != Method::Get || !req.url.contains("shell-descriptors") {
                    return None;
                }
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => ok(r#"{"items": [{"identification": "s1"}, {"identification": "s2"}]}"#),
                    1 => ok(r#"{"items": [{"identification": "s3"}]}"#),
                    _ => ok(r#"{"items": []}"#),
                }
            })
            .status_for(Method::Get, "/management/", 200, "[]");

        let summary = reset_with_transport(&config(""), &transport).await;

        let shells = &summary.collections[0];
        assert!(shells.converged);
        assert_eq!(shells.deleted, 3);
        assert_eq!(shells.rounds, 2);
        let deletes: Vec<String> = transport
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("DELETE"))
            .collect();
        assert_eq!(
            deletes,
            vec![
                "DELETE http://registry/registry/shell-descriptors/s1",
                "DELETE http://registry/registry/shell-descriptors/s2",
                "DELETE http://registry/registry/shell-descriptors/s3",
            ]
        );
    }

    #[tokio::test]
    async fn undeletable_items_end_the_loop_unconverged() {
        let transport = RecordingTransport::new()
            .status_for(Method::Get, "shell-descriptors", 200, r#"{"items": []}"#)
            .status_for(Method::Get, "/assets", 200, r#"[{"@id": "stuck"}]"#)
            .status_for(Method::Delete, "/assets/", 409, "in use")
            .status_for(Method::Get, "/management/", 200, "[]");

        let summary = reset_with_transport(&config(""), &transport).await;

        let assets = summary.collections.last().unwrap();
        assert_eq!(assets.collection, "a/assets");
        assert!(!assets.converged);
        assert_eq!(assets.failed, 1);
        assert_eq!(assets.rounds, 1);
        assert!(!summary.converged());
        // Other collections are still drained.
        assert!(summary.collections[..3].iter().all(|c| c.converged));
    }

    #[tokio::test]
    async fn reset_without_providers_drains_only_the_registry() {
        let mut config = config("");
        config.providers.clear();
        let transport = RecordingTransport::new()
            .status_for(Method::Get, "shell-descriptors", 200, r#"{"items": []}"#);

        let summary = reset_with_transport(&config, &transport).await;

        assert_eq!(summary.collections.len(), 1);
        assert!(summary.converged());
        assert_eq!(
            transport.calls(),
            vec!["GET http://registry/registry/shell-descriptors?pageSize=2"]
        );
    }

    #[tokio::test]
    async fn failed_listing_marks_collection_unconverged() {
        let transport = RecordingTransport::new()
            .status_for(Method::Get, "shell-descriptors", 503, "down")
            .status_for(Method::Get, "/management/", 200, "[]");

        let summary = reset_with_transport(&config(""), &transport).await;

        let shells = &summary.collections[0];
        assert!(!shells.converged);
        assert_eq!(shells.detail.as_deref(), Some("listing returned HTTP 503"));
    }

    #[tokio::test]
    async fn round_limit_bounds_a_listing_that_never_shrinks() {
        // Deletes succeed but the listing keeps returning the same entry.
        let transport = RecordingTransport::new()
            .status_for(Method::Get, "shell-descriptors", 200, r#"{"items": []}"#)
            .status_for(Method::Get, "/contractdefinitions", 200, r#"[{"@id": "c1"}]"#)
            .status_for(Method::Get, "/management/", 200, "[]");

        let summary = reset_with_transport(&config("resources:\n  reset_max_rounds: 3\n"), &transport).await;

        let contracts = &summary.collections[1];
        assert!(!contracts.converged);
        assert_eq!(contracts.rounds, 3);
        assert_eq!(contracts.deleted, 3);
        assert_eq!(contracts.detail.as_deref(), Some("round limit of 3 reached"));
    }

    #[tokio::test]
    async fn aas3_listing_uses_result_ids() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = RecordingTransport::new()
            .respond(move |req| {
                if req.method != Method::Get || !req.url.contains("shell-descriptors") {
                    return None;
                }
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    ok(r#"{"result": [{"id": "urn:uuid:shell"}]}"#)
                } else {
                    ok(r#"{"result": []}"#)
                }
            })
            .status_for(Method::Get, "/management/", 200, "[]");

        let mut config = config("");
        config.registry.schema = crate::config::types::RegistrySchemaKind::Aas3;
        let summary = reset_with_transport(&config, &transport).await;

        assert_eq!(summary.collections[0].deleted, 1);
        assert!(transport
            .calls()
            .contains(&"DELETE http://registry/shell-descriptors/urn:uuid:shell".to_string()));
    }

    #[test]
    fn connector_listing_ids_mix_generations() {
        let listing = serde_json::json!([
            {"@id": "a"},
            {"id": "b"},
            {"properties": {"asset:prop:id": "c"}}
        ]);
        assert_eq!(connector_listing_ids(&listing), vec!["a", "b", "c"]);
        assert!(connector_listing_ids(&serde_json::json!({})).is_empty());
    }
}
