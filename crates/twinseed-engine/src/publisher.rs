//! Ordered publication of one twin's artifacts.
//!
//! Per submodel: content, asset, policy, contract definition. After all
//! submodels: the shell. A failed call is recorded and publication continues.

use std::sync::Arc;

use serde_json::Value;
use twinseed_types::{ArtifactKind, ProvisioningTarget, PublishOutcome, PublishResult};

use crate::config::ProvisionConfig;
use crate::result::TwinOutcome;
use crate::transform::{SubmodelPlan, TwinPlan};
use crate::transport::{Exchange, Request, Service, Transport};

/// Connector management collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementCollection {
    Assets,
    PolicyDefinitions,
    ContractDefinitions,
    CatalogRequest,
}

impl ManagementCollection {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::PolicyDefinitions => "policydefinitions",
            Self::ContractDefinitions => "contractdefinitions",
            Self::CatalogRequest => "catalog/request",
        }
    }
}

/// Builds management URLs below a connector base URL.
#[derive(Debug, Clone)]
pub struct ManagementApi {
    management_path: String,
}

impl ManagementApi {
    #[must_use]
    pub fn new(management_path: impl Into<String>) -> Self {
        Self {
            management_path: management_path.into(),
        }
    }

    #[must_use]
    pub fn url(&self, connector_base: &str, collection: ManagementCollection) -> String {
        format!("{connector_base}{}/{}", self.management_path, collection.path())
    }
}

/// Convert a finished exchange into a [`PublishResult`].
pub(crate) fn publish_result(
    artifact: ArtifactKind,
    entity_id: &str,
    target: Option<&str>,
    request: &Request,
    exchange: Exchange,
) -> PublishResult {
    let (status, outcome, detail) = match exchange.result {
        Ok(response) if response.is_success() => {
            (Some(response.status), PublishOutcome::Published, None)
        }
        Ok(response) => (
            Some(response.status),
            PublishOutcome::Rejected,
            Some(response.body),
        ),
        Err(err) => (None, PublishOutcome::Unreachable, Some(err.to_string())),
    };
    PublishResult {
        artifact,
        entity_id: entity_id.to_string(),
        target: target.map(str::to_string),
        url: request.url.clone(),
        status,
        outcome,
        attempts: exchange.attempts,
        detail,
    }
}

/// Publishes twins through a shared transport.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    targets: Vec<ProvisioningTarget>,
    management: ManagementApi,
    shell_url: String,
}

impl Publisher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: &ProvisionConfig) -> Self {
        Self {
            transport,
            targets: config.targets(),
            management: ManagementApi::new(config.connector.management_path.clone()),
            shell_url: config.registry.descriptors_url(),
        }
    }

    /// Publish every artifact of `plan` in order.
    pub async fn publish_twin(&self, plan: &TwinPlan) -> TwinOutcome {
        let mut results = Vec::with_capacity(plan.submodels.len() * 4 + 1);

        for submodel in &plan.submodels {
            self.publish_submodel(submodel, &mut results).await;
        }

        let request = Request::post(Service::Registry, self.shell_url.clone(), plan.shell_body.clone());
        results.push(
            self.call(ArtifactKind::Shell, &plan.twin.shell_id, None, request)
                .await,
        );

        let outcome = TwinOutcome {
            catenax_id: plan.twin.global_asset_id.to_string(),
            shell_id: plan.twin.shell_id.clone(),
            results,
        };
        if outcome.is_complete() {
            tracing::info!(
                catenax_id = outcome.catenax_id.as_str(),
                submodels = plan.submodels.len(),
                "Twin published"
            );
        } else {
            tracing::warn!(
                catenax_id = outcome.catenax_id.as_str(),
                failed = outcome.failures().count(),
                "Twin published with failures"
            );
        }
        outcome
    }

    async fn publish_submodel(&self, submodel: &SubmodelPlan, results: &mut Vec<PublishResult>) {
        let Some(target) = self.targets.get(submodel.target_index) else {
            tracing::error!(
                target_index = submodel.target_index,
                "Submodel routed to unknown target"
            );
            return;
        };
        let name = Some(target.name.as_str());
        let descriptor = &submodel.descriptor;

        if let Some(ref content) = submodel.content {
            let request = Request::post(
                Service::Content,
                target.content_upload_url(&descriptor.id),
                content.clone(),
            );
            results.push(
                self.call(ArtifactKind::Submodel, &descriptor.id, name, request)
                    .await,
            );
        }

        let steps: [(ArtifactKind, ManagementCollection, &str, &Value); 3] = [
            (
                ArtifactKind::Asset,
                ManagementCollection::Assets,
                descriptor.asset_id.as_str(),
                &submodel.asset_body,
            ),
            (
                ArtifactKind::Policy,
                ManagementCollection::PolicyDefinitions,
                submodel.policy_id.as_str(),
                &submodel.policy_body,
            ),
            (
                ArtifactKind::ContractDefinition,
                ManagementCollection::ContractDefinitions,
                descriptor.asset_id.as_str(),
                &submodel.contract_body,
            ),
        ];
        for (artifact, collection, entity_id, body) in steps {
            let url = self.management.url(&target.connector_upload_url, collection);
            let request = Request::post(Service::Connector, url, body.clone());
            results.push(self.call(artifact, entity_id, name, request).await);
        }
    }

    async fn call(
        &self,
        artifact: ArtifactKind,
        entity_id: &str,
        target: Option<&str>,
        request: Request,
    ) -> PublishResult {
        let exchange = self.transport.send(&request).await;
        let result = publish_result(artifact, entity_id, target, &request, exchange);
        if !result.is_success() {
            tracing::warn!(
                artifact = %artifact,
                entity_id,
                url = result.url.as_str(),
                status = ?result.status,
                outcome = %result.outcome,
                "Publication call failed"
            );
        }
        result
    }
}
