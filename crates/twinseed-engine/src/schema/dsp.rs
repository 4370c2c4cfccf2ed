//! JSON-LD management API bodies (`@context`, `dataAddress`).

use serde_json::{json, Value};

use super::{dsp_permission, template_permissions, AssetSpec, ConnectorSchema, ODRL_NS};
use crate::config::types::ConnectorSchemaKind;

const EDC_ID_OPERAND: &str = "https://w3id.org/edc/v0.0.1/ns/id";

#[derive(Debug, Clone, Copy, Default)]
pub struct DspSchema;

impl ConnectorSchema for DspSchema {
    fn kind(&self) -> ConnectorSchemaKind {
        ConnectorSchemaKind::Dsp
    }

    fn asset_body(&self, asset: &AssetSpec<'_>) -> Value {
        let proxy = if asset.proxy { "true" } else { "false" };
        let mut properties = json!({ "description": asset.description });
        if let Some(asset_type) = asset.asset_type {
            properties["type"] = json!(asset_type);
        }
        json!({
            "@context": {},
            "asset": {
                "@type": "Asset",
                "@id": asset.asset_id,
                "properties": properties
            },
            "dataAddress": {
                "@type": "DataAddress",
                "type": "HttpData",
                "baseUrl": asset.base_url,
                "proxyPath": proxy,
                "proxyBody": proxy,
                "proxyMethod": proxy,
                "proxyQueryParams": proxy
            }
        })
    }

    fn policy_body(&self, policy_id: &str, target_asset: Option<&str>, template: &Value) -> Value {
        let context = template
            .get("@context")
            .cloned()
            .unwrap_or_else(|| json!({ "odrl": ODRL_NS }));
        let permissions: Vec<Value> = template_permissions(template)
            .iter()
            .map(dsp_permission)
            .map(|mut permission| {
                if let (Some(asset), Some(obj)) = (target_asset, permission.as_object_mut()) {
                    obj.insert("odrl:target".to_string(), json!(asset));
                }
                permission
            })
            .collect();
        json!({
            "@context": context,
            "@type": "PolicyDefinitionRequestDto",
            "@id": policy_id,
            "policy": {
                "@type": "Policy",
                "odrl:permission": permissions
            }
        })
    }

    fn contract_body(&self, contract_id: &str, policy_id: &str, asset_id: &str) -> Value {
        json!({
            "@context": {},
            "@type": "ContractDefinition",
            "@id": contract_id,
            "accessPolicyId": policy_id,
            "contractPolicyId": policy_id,
            "assetsSelector": {
                "@type": "CriterionDto",
                "operandLeft": EDC_ID_OPERAND,
                "operator": "=",
                "operandRight": asset_id
            }
        })
    }
}
