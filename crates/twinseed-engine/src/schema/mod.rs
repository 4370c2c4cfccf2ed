//! Wire shapes of connector and registry artifacts.
//!
//! Each downstream service comes in two schema generations. The variant is
//! selected once per run; nothing else in the engine builds JSON bodies.

pub mod dsp;
pub mod flat;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::types::ConnectorSchemaKind;

pub use registry::RegistrySchema;

/// Asset type marking the registry endpoint in connector catalogs.
pub const REGISTRY_ASSET_TYPE: &str = "data.core.digitalTwinRegistry";

/// ODRL namespace used by policy templates.
pub const ODRL_NS: &str = "http://www.w3.org/ns/odrl/2/";

/// Input for an asset body.
#[derive(Debug, Clone, Copy)]
pub struct AssetSpec<'a> {
    pub asset_id: &'a str,
    pub description: &'a str,
    /// Where the connector fetches the data from.
    pub base_url: &'a str,
    /// Optional `type` property, set for the registry asset.
    pub asset_type: Option<&'a str>,
    /// Forward path, body, method and query of consumer requests.
    pub proxy: bool,
}

/// Body builders for one connector management API generation.
pub trait ConnectorSchema: fmt::Debug + Send + Sync {
    fn kind(&self) -> ConnectorSchemaKind;

    fn asset_body(&self, asset: &AssetSpec<'_>) -> Value;

    /// Policy definition `policy_id`, derived from `template`.
    ///
    /// With `target_asset` set the permissions are bound to that asset.
    fn policy_body(&self, policy_id: &str, target_asset: Option<&str>, template: &Value) -> Value;

    /// Contract definition granting `policy_id` (access and contract) on `asset_id`.
    fn contract_body(&self, contract_id: &str, policy_id: &str, asset_id: &str) -> Value;
}

/// Schema implementation for `kind`.
#[must_use]
pub fn connector_schema(kind: ConnectorSchemaKind) -> Arc<dyn ConnectorSchema> {
    match kind {
        ConnectorSchemaKind::Flat => Arc::new(flat::FlatSchema),
        ConnectorSchemaKind::Dsp => Arc::new(dsp::DspSchema),
    }
}

/// Built-in policy template: no constraints, empty permission list.
#[must_use]
pub fn default_policy_template(policy_id: &str) -> Value {
    json!({
        "@context": { "odrl": ODRL_NS },
        "@type": "PolicyDefinitionRequestDto",
        "@id": policy_id,
        "policy": {
            "@type": "Policy",
            "odrl:permission": []
        }
    })
}

/// Permission list of a template in either schema generation.
#[must_use]
pub fn template_permissions(template: &Value) -> Vec<Value> {
    template
        .pointer("/policy/odrl:permission")
        .or_else(|| template.get("permissions"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// `edctype` of flat-generation permissions.
pub(crate) const FLAT_PERMISSION_TYPE: &str = "dataspaceconnector:permission";

/// Action of a permission in either generation, without prefix and upper-cased.
fn permission_action(permission: &Value) -> Option<String> {
    let action = permission
        .get("odrl:action")
        .or_else(|| permission.get("action"))?;
    let name = match action {
        Value::String(name) => name.as_str(),
        Value::Object(obj) => obj
            .get("odrl:type")
            .or_else(|| obj.get("type"))
            .or_else(|| obj.get("@id"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    Some(name.trim_start_matches("odrl:").to_ascii_uppercase())
}

/// Rewrite a JSON-LD template permission into the flat shape.
///
/// Constraints are carried over unchanged. Flat permissions pass through.
pub(crate) fn flat_permission(permission: &Value) -> Value {
    if permission.get("odrl:action").is_none() {
        return permission.clone();
    }
    let action = permission_action(permission).unwrap_or_else(|| "USE".to_string());
    let mut flat = json!({
        "action": { "type": action },
        "edctype": FLAT_PERMISSION_TYPE
    });
    if let Some(constraints) = permission.get("odrl:constraint") {
        flat["constraints"] = constraints.clone();
    }
    flat
}

/// Rewrite a flat template permission into the JSON-LD shape.
///
/// Constraints are carried over unchanged. JSON-LD permissions pass through.
pub(crate) fn dsp_permission(permission: &Value) -> Value {
    if permission.get("action").is_none() {
        return permission.clone();
    }
    let action = permission_action(permission).unwrap_or_else(|| "USE".to_string());
    let mut dsp = json!({ "odrl:action": { "odrl:type": action } });
    if let Some(constraints) = permission.get("constraints") {
        dsp["odrl:constraint"] = constraints.clone();
    }
    dsp
}

/// Catalog query for the registry asset offered by a connector.
#[must_use]
pub fn catalog_request_body(provider_dsp_url: &str) -> Value {
    json!({
        "@context": {
            "dct": "https://purl.org/dc/terms/",
            "tx": "https://w3id.org/tractusx/v0.0.1/ns/",
            "edc": "https://w3id.org/edc/v0.0.1/ns/",
            "odrl": ODRL_NS,
            "dcat": "https://www.w3.org/ns/dcat/",
            "dspace": "https://w3id.org/dspace/v0.8/"
        },
        "edc:protocol": "dataspace-protocol-http",
        "edc:providerUrl": provider_dsp_url,
        "edc:querySpec": {
            "edc:filterExpression": {
                "@type": "edc:Criterion",
                "edc:operandLeft": "https://w3id.org/edc/v0.0.1/ns/type",
                "edc:operator": "=",
                "edc:operandRight": REGISTRY_ASSET_TYPE
            }
        }
    })
}

/// Whether a catalog response offers at least one dataset.
#[must_use]
pub fn catalog_has_dataset(catalog: &Value) -> bool {
    match catalog.get("dcat:dataset") {
        Some(Value::Array(datasets)) => !datasets.is_empty(),
        Some(Value::Object(_)) => true,
        _ => false,
    }
}

/// Id of one entry in a connector listing, whatever its generation.
#[must_use]
pub fn listed_connector_id(entry: &Value) -> Option<String> {
    let id = entry
        .get("@id")
        .or_else(|| entry.get("id"))
        .or_else(|| entry.pointer("/properties/asset:prop:id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
