//! Planning: test-data records → twins, submodels and their wire payloads.
//!
//! Planning is single-threaded and deterministic for a fixed id source. Every
//! HTTP body the publisher sends is built here; the publisher only moves bytes.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use serde_json::Value;
use twinseed_types::semantic::{aspect_name, classify_key};
use twinseed_types::{
    AspectKind, AspectRole, Bpn, CatenaXId, DigitalTwin, KeyClass, ProvisioningTarget,
    SpecificAssetId, SubmodelDescriptor,
};

use crate::config::ProvisionConfig;
use crate::document::{PartRecord, TestDataDocument};
use crate::endpoint::EndpointBuilder;
use crate::ids::{asset_id, asset_policy_id, IdSource};
use crate::partition::Partitioner;
use crate::schema::{
    connector_schema, default_policy_template, AssetSpec, ConnectorSchema, RegistrySchema,
};

/// Semantic id of the certificate statistic injected for assembled parts.
pub const ESR_SEMANTIC_ID: &str =
    "urn:bamm:io.catenax.esr_certificates.esr_certificate_state_statistic:1.0.1#EsrCertificateStateStatistic";

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Mutable planning state owned by the orchestrator.
pub struct RunState {
    sequence: u64,
    ids: Box<dyn IdSource>,
    routed: Vec<usize>,
}

impl RunState {
    #[must_use]
    pub fn new(ids: Box<dyn IdSource>, targets: usize) -> Self {
        Self {
            sequence: 0,
            ids,
            routed: vec![0; targets],
        }
    }

    /// Submodels assigned so far.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Submodels routed to each target, by target index.
    #[must_use]
    pub fn routed(&self) -> &[usize] {
        &self.routed
    }

    fn next_id(&mut self) -> String {
        self.ids.next_urn()
    }

    fn route(&mut self, partitioner: &Partitioner, bpn: &Bpn) -> usize {
        let index = partitioner.assign(self.sequence, bpn.as_str());
        self.sequence += 1;
        if let Some(count) = self.routed.get_mut(index) {
            *count += 1;
        }
        index
    }
}

impl std::fmt::Debug for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunState")
            .field("sequence", &self.sequence)
            .field("routed", &self.routed)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Plan model
// ---------------------------------------------------------------------------

/// Everything needed to publish one submodel.
#[derive(Debug, Clone)]
pub struct SubmodelPlan {
    pub descriptor: SubmodelDescriptor,
    pub target_index: usize,
    /// Aspect payload; `None` for injected submodels served elsewhere.
    pub content: Option<Value>,
    pub asset_body: Value,
    /// Per-asset policy definition id.
    pub policy_id: String,
    pub policy_body: Value,
    pub contract_body: Value,
}

/// One twin with its submodels, in publication order.
#[derive(Debug, Clone)]
pub struct TwinPlan {
    pub twin: DigitalTwin,
    pub submodels: Vec<SubmodelPlan>,
    pub shell_body: Value,
}

/// Counters gathered while planning.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PlanStats {
    pub records: usize,
    /// Records dropped by the BPN allow-list.
    pub filtered_records: usize,
    /// Records folded into an earlier twin with the same `catenaXId`.
    pub merged_records: usize,
    pub administrative_keys: usize,
    pub unrecognized_keys: usize,
    /// ESR certificate statistics added to assemblies that lacked one.
    pub injected_esr: usize,
    pub data_warnings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub twins: Vec<TwinPlan>,
    pub stats: PlanStats,
}

impl Plan {
    #[must_use]
    pub fn submodel_count(&self) -> usize {
        self.twins.iter().map(|t| t.submodels.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

/// Turns a document into a [`Plan`] for one run configuration.
#[derive(Debug)]
pub struct Transformer {
    targets: Vec<ProvisioningTarget>,
    partitioner: Partitioner,
    endpoints: EndpointBuilder,
    connector: Arc<dyn ConnectorSchema>,
    registry: RegistrySchema,
    default_policy: String,
    templates: IndexMap<String, Value>,
    filter: Vec<String>,
}

/// Policy templates by policy id: the built-in default overlaid with the document's.
#[must_use]
pub fn policy_templates(default_id: &str, document: &IndexMap<String, Value>) -> IndexMap<String, Value> {
    let mut templates = IndexMap::new();
    templates.insert(default_id.to_string(), default_policy_template(default_id));
    for (name, template) in document {
        let id = template
            .get("@id")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string();
        templates.insert(id, template.clone());
    }
    templates
}

impl Transformer {
    /// # Errors
    ///
    /// Returns an error if no provider is configured or the partitioning config
    /// references unknown providers.
    pub fn new(config: &ProvisionConfig, document_policies: &IndexMap<String, Value>) -> Result<Self> {
        if config.providers.is_empty() {
            bail!("At least one provider must be configured");
        }
        Ok(Self {
            targets: config.targets(),
            partitioner: Partitioner::from_config(config)?,
            endpoints: EndpointBuilder::from_config(config),
            connector: connector_schema(config.connector.schema),
            registry: RegistrySchema::new(config.registry.schema),
            default_policy: config.policy.default_id.clone(),
            templates: policy_templates(&config.policy.default_id, document_policies),
            filter: config.filter.bpns.clone(),
        })
    }

    #[must_use]
    pub fn targets(&self) -> &[ProvisioningTarget] {
        &self.targets
    }

    #[must_use]
    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    #[must_use]
    pub fn connector_schema(&self) -> &Arc<dyn ConnectorSchema> {
        &self.connector
    }

    /// Policy templates shared by all connectors, by policy id.
    #[must_use]
    pub fn templates(&self) -> &IndexMap<String, Value> {
        &self.templates
    }

    /// Plan every record of `document` in document order.
    ///
    /// # Errors
    ///
    /// Returns an error if a submodel is routed to a provider that does not exist.
    pub fn plan(&self, document: &TestDataDocument, state: &mut RunState) -> Result<Plan> {
        let mut plan = Plan::default();
        let mut by_id: HashMap<CatenaXId, usize> = HashMap::new();
        let mut policies: Vec<String> = Vec::new();

        for record in document.records() {
            plan.stats.records += 1;
            if !self.filter.is_empty() && !self.filter.iter().any(|b| b == record.bpn.as_str()) {
                plan.stats.filtered_records += 1;
                tracing::debug!(
                    catenax_id = %record.catenax_id,
                    bpn = %record.bpn,
                    "Record skipped by BPN filter"
                );
                continue;
            }

            let slot = match by_id.get(&record.catenax_id) {
                Some(&slot) => {
                    plan.stats.merged_records += 1;
                    tracing::warn!(
                        catenax_id = %record.catenax_id,
                        record = record.index,
                        "Duplicate catenaXId, merging aspects into existing twin"
                    );
                    slot
                }
                None => {
                    let shell_id = state.next_id();
                    plan.twins.push(TwinPlan {
                        twin: DigitalTwin::new(
                            record.catenax_id.clone(),
                            shell_id,
                            record.bpn.clone(),
                        ),
                        submodels: Vec::new(),
                        shell_body: Value::Null,
                    });
                    policies.push(
                        record
                            .policy
                            .clone()
                            .unwrap_or_else(|| self.default_policy.clone()),
                    );
                    by_id.insert(record.catenax_id.clone(), plan.twins.len() - 1);
                    plan.twins.len() - 1
                }
            };

            let policy = policies[slot].clone();
            self.plan_record(record, &policy, &mut plan.twins[slot], &mut plan.stats, state)?;
        }

        // Twins whose records carried no aspect have nothing to publish.
        plan.twins.retain(|t| {
            if t.submodels.is_empty() {
                tracing::debug!(catenax_id = %t.twin.global_asset_id, "Twin has no submodels, skipping");
                false
            } else {
                true
            }
        });
        for twin in &mut plan.twins {
            twin.shell_body = self.registry.shell_body(&twin.twin);
        }

        tracing::info!(
            twins = plan.twins.len(),
            submodels = plan.submodel_count(),
            records = plan.stats.records,
            filtered = plan.stats.filtered_records,
            strategy = self.partitioner.strategy_name(),
            "Plan built"
        );
        Ok(plan)
    }

    fn plan_record(
        &self,
        record: &PartRecord,
        policy: &str,
        twin: &mut TwinPlan,
        stats: &mut PlanStats,
        state: &mut RunState,
    ) -> Result<()> {
        let mut has_esr = false;
        let mut needs_esr = false;

        for (key, value) in &record.entries {
            let aspect = match classify_key(key) {
                KeyClass::Aspect(aspect) => aspect,
                KeyClass::Scalar | KeyClass::ContainerMarker => continue,
                KeyClass::Administrative => {
                    stats.administrative_keys += 1;
                    continue;
                }
                KeyClass::Unrecognized => {
                    stats.unrecognized_keys += 1;
                    tracing::warn!(
                        catenax_id = %record.catenax_id,
                        key = key.as_str(),
                        "Unrecognized semantic type, skipping"
                    );
                    continue;
                }
            };

            let payload = value.as_array().and_then(|items| items.first()).cloned();
            if payload.is_none() {
                stats.data_warnings += 1;
                tracing::warn!(
                    catenax_id = %record.catenax_id,
                    key = key.as_str(),
                    "Aspect has no payload element, publishing without content"
                );
            }

            if let Some(ref payload) = payload {
                if aspect.role() == AspectRole::Identity {
                    self.read_identity(aspect, payload, &mut twin.twin, stats);
                }
                if aspect == AspectKind::SingleLevelBomAsBuilt && has_child_items(payload) {
                    needs_esr = true;
                }
            }
            if aspect == AspectKind::EsrCertificateStateStatistic {
                has_esr = true;
            }

            let submodel = self.plan_submodel(key, aspect, payload, record, policy, state)?;
            twin.twin.push_descriptor(submodel.descriptor.clone());
            twin.submodels.push(submodel);
        }

        if needs_esr && !has_esr && self.endpoints.esr_enabled() {
            stats.injected_esr += 1;
            let submodel = self.plan_submodel(
                ESR_SEMANTIC_ID,
                AspectKind::EsrCertificateStateStatistic,
                None,
                record,
                policy,
                state,
            )?;
            tracing::debug!(
                catenax_id = %record.catenax_id,
                submodel_id = submodel.descriptor.id.as_str(),
                "Injected ESR certificate statistic"
            );
            twin.twin.push_descriptor(submodel.descriptor.clone());
            twin.submodels.push(submodel);
        }
        Ok(())
    }

    fn read_identity(
        &self,
        aspect: AspectKind,
        payload: &Value,
        twin: &mut DigitalTwin,
        stats: &mut PlanStats,
    ) {
        if !twin.has_id_short() {
            let name = payload
                .pointer("/partTypeInformation/nameAtManufacturer")
                .and_then(Value::as_str);
            if name.is_none() {
                stats.data_warnings += 1;
                tracing::warn!(
                    catenax_id = %twin.global_asset_id,
                    aspect = %aspect,
                    "Identity aspect lacks partTypeInformation.nameAtManufacturer"
                );
            }
            twin.set_id_short_once(name.unwrap_or_default());
        }

        if let Some(identifiers) = payload.get("localIdentifiers").and_then(Value::as_array) {
            for identifier in identifiers {
                let key = identifier
                    .get("key")
                    .or_else(|| identifier.get("name"))
                    .and_then(Value::as_str);
                let value = identifier.get("value").and_then(Value::as_str);
                if let (Some(key), Some(value)) = (key, value) {
                    twin.add_specific_asset_id(SpecificAssetId::new(key, value));
                }
            }
        }

        if aspect == AspectKind::PartAsPlanned {
            if let Some(part_id) = payload
                .pointer("/partTypeInformation/manufacturerPartId")
                .and_then(Value::as_str)
            {
                twin.add_specific_asset_id(SpecificAssetId::new("manufacturerPartId", part_id));
            }
        }
    }

    fn plan_submodel(
        &self,
        semantic_id: &str,
        aspect: AspectKind,
        content: Option<Value>,
        record: &PartRecord,
        policy: &str,
        state: &mut RunState,
    ) -> Result<SubmodelPlan> {
        let submodel_id = state.next_id();
        let target_index = state.route(&self.partitioner, &record.bpn);
        let target = self.targets.get(target_index).ok_or_else(|| {
            anyhow!(
                "submodel of {} routed to provider #{target_index}, but only {} are configured",
                record.catenax_id,
                self.targets.len()
            )
        })?;
        let asset = asset_id(&record.catenax_id, &submodel_id);

        let endpoint_address = self.endpoints.endpoint_address(
            &record.catenax_id,
            &record.bpn,
            aspect,
            &submodel_id,
            target,
        );
        let base_url = match self.endpoints.esr_address(&record.catenax_id) {
            Some(esr) if aspect == AspectKind::EsrCertificateStateStatistic => esr,
            _ => target.content_display_url(&submodel_id),
        };

        let template = self.templates.get(policy).cloned().unwrap_or_else(|| {
            tracing::warn!(
                policy,
                "Policy has no template, using empty permission set"
            );
            default_policy_template(policy)
        });
        let policy_id = asset_policy_id(policy, &asset);
        let description = format!("{aspect} of {}", record.catenax_id);

        Ok(SubmodelPlan {
            asset_body: self.connector.asset_body(&AssetSpec {
                asset_id: &asset,
                description: &description,
                base_url: &base_url,
                asset_type: None,
                proxy: false,
            }),
            policy_body: self.connector.policy_body(&policy_id, Some(&asset), &template),
            contract_body: self.connector.contract_body(&asset, &policy_id, &asset),
            policy_id,
            content,
            target_index,
            descriptor: SubmodelDescriptor {
                id: submodel_id,
                id_short: aspect_name(semantic_id).to_string(),
                semantic_id: semantic_id.to_string(),
                aspect,
                endpoint_address,
                asset_id: asset,
                connector_url: target.connector_url.clone(),
                target: target.name.clone(),
            },
        })
    }
}

fn has_child_items(payload: &Value) -> bool {
    payload
        .get("childItems")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty())
}
