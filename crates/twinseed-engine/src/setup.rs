//! Shared connector setup run once before any twin is published.
//!
//! Ensures every connector carries the named policy definitions and offers the
//! registry asset. Artifacts that already exist are left untouched.

use indexmap::IndexMap;
use serde_json::Value;
use twinseed_types::{ArtifactKind, ProvisioningTarget, PublishOutcome, PublishResult};

use crate::config::ProvisionConfig;
use crate::publisher::{publish_result, ManagementApi, ManagementCollection};
use crate::schema::{catalog_has_dataset, catalog_request_body, AssetSpec, ConnectorSchema, REGISTRY_ASSET_TYPE};
use crate::transport::{Request, Service, Transport};

const REGISTRY_ASSET_DESCRIPTION: &str = "Digital Twin Registry Endpoint";

/// Inputs of the setup stage.
pub struct SetupStage<'a> {
    pub transport: &'a dyn Transport,
    pub schema: &'a dyn ConnectorSchema,
    pub config: &'a ProvisionConfig,
    /// Policy templates by policy id.
    pub templates: &'a IndexMap<String, Value>,
}

impl SetupStage<'_> {
    /// Run all enabled setup steps against every connector.
    pub async fn run(&self) -> Vec<PublishResult> {
        let management = ManagementApi::new(self.config.connector.management_path.clone());
        let mut results = Vec::new();

        for target in self.config.targets() {
            if self.config.setup.policies {
                for (policy_id, template) in self.templates {
                    results.push(
                        self.ensure_policy(&management, &target, policy_id, template)
                            .await,
                    );
                }
            }
            if self.config.setup.registry_asset {
                results.extend(self.ensure_registry_asset(&management, &target).await);
            }
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(calls = results.len(), failed, "Shared setup finished");
        results
    }

    async fn ensure_policy(
        &self,
        management: &ManagementApi,
        target: &ProvisioningTarget,
        policy_id: &str,
        template: &Value,
    ) -> PublishResult {
        let collection = management.url(
            &target.connector_upload_url,
            ManagementCollection::PolicyDefinitions,
        );

        let lookup = Request::get(Service::Connector, format!("{collection}/{policy_id}"));
        let exchange = self.transport.send(&lookup).await;
        if let Ok(ref response) = exchange.result {
            let found = response.status == 200 && response.json().is_some_and(|v| !is_empty_json(&v));
            if found {
                tracing::debug!(policy_id, target = target.name.as_str(), "Policy exists, skipping creation");
                return PublishResult {
                    artifact: ArtifactKind::Policy,
                    entity_id: policy_id.to_string(),
                    target: Some(target.name.clone()),
                    url: lookup.url,
                    status: Some(response.status),
                    outcome: PublishOutcome::Existing,
                    attempts: exchange.attempts,
                    detail: None,
                };
            }
        }

        let body = self.schema.policy_body(policy_id, None, template);
        let create = Request::post(Service::Connector, collection, body);
        let exchange = self.transport.send(&create).await;
        let result = publish_result(ArtifactKind::Policy, policy_id, Some(&target.name), &create, exchange);
        log_created(&result);
        result
    }

    async fn ensure_registry_asset(
        &self,
        management: &ManagementApi,
        target: &ProvisioningTarget,
    ) -> Vec<PublishResult> {
        let asset_id = self.config.setup.registry_asset_id.as_str();
        let catalog = Request::post(
            Service::Connector,
            management.url(&target.connector_upload_url, ManagementCollection::CatalogRequest),
            catalog_request_body(&format!("{}/api/v1/dsp", target.connector_url)),
        );
        let exchange = self.transport.send(&catalog).await;
        if let Ok(ref response) = exchange.result {
            let offered = response.is_success() && response.json().is_some_and(|v| catalog_has_dataset(&v));
            if offered {
                tracing::debug!(target = target.name.as_str(), "Registry asset already offered");
                return vec![PublishResult {
                    artifact: ArtifactKind::Asset,
                    entity_id: asset_id.to_string(),
                    target: Some(target.name.clone()),
                    url: catalog.url,
                    status: Some(response.status),
                    outcome: PublishOutcome::Existing,
                    attempts: exchange.attempts,
                    detail: None,
                }];
            }
        }

        let asset = Request::post(
            Service::Connector,
            management.url(&target.connector_upload_url, ManagementCollection::Assets),
            self.schema.asset_body(&AssetSpec {
                asset_id,
                description: REGISTRY_ASSET_DESCRIPTION,
                base_url: self.config.registry.effective_upload_url(),
                asset_type: Some(REGISTRY_ASSET_TYPE),
                proxy: true,
            }),
        );
        let exchange = self.transport.send(&asset).await;
        let asset_result = publish_result(ArtifactKind::Asset, asset_id, Some(&target.name), &asset, exchange);
        log_created(&asset_result);

        let policy_id = self.config.policy.default_id.as_str();
        let contract = Request::post(
            Service::Connector,
            management.url(&target.connector_upload_url, ManagementCollection::ContractDefinitions),
            self.schema.contract_body(asset_id, policy_id, asset_id),
        );
        let exchange = self.transport.send(&contract).await;
        let contract_result = publish_result(
            ArtifactKind::ContractDefinition,
            asset_id,
            Some(&target.name),
            &contract,
            exchange,
        );
        log_created(&contract_result);

        vec![asset_result, contract_result]
    }
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn log_created(result: &PublishResult) {
    if result.is_success() {
        tracing::info!(
            artifact = %result.artifact,
            entity_id = result.entity_id.as_str(),
            target = ?result.target,
            "Shared artifact created"
        );
    } else {
        tracing::warn!(
            artifact = %result.artifact,
            entity_id = result.entity_id.as_str(),
            status = ?result.status,
            detail = ?result.detail,
            "Shared artifact creation failed"
        );
    }
}
