//! Flat `asset:prop:*` management API bodies.

use serde_json::{json, Value};

use super::{flat_permission, template_permissions, AssetSpec, ConnectorSchema, FLAT_PERMISSION_TYPE};
use crate::config::types::ConnectorSchemaKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatSchema;

impl ConnectorSchema for FlatSchema {
    fn kind(&self) -> ConnectorSchemaKind {
        ConnectorSchemaKind::Flat
    }

    fn asset_body(&self, asset: &AssetSpec<'_>) -> Value {
        let mut properties = json!({
            "asset:prop:id": asset.asset_id,
            "asset:prop:description": asset.description,
            "asset:prop:contenttype": "application/json"
        });
        if let Some(asset_type) = asset.asset_type {
            properties["asset:prop:type"] = json!(asset_type);
        }
        json!({
            "asset": { "properties": properties },
            "dataAddress": {
                "properties": {
                    "baseUrl": asset.base_url,
                    "type": "HttpData",
                    "proxyBody": asset.proxy,
                    "proxyMethod": asset.proxy,
                    "proxyPath": asset.proxy,
                    "proxyQueryParams": asset.proxy
                }
            }
        })
    }

    fn policy_body(&self, policy_id: &str, target_asset: Option<&str>, template: &Value) -> Value {
        let mut permissions: Vec<Value> = template_permissions(template)
            .iter()
            .map(flat_permission)
            .collect();
        if let Some(asset) = target_asset {
            if permissions.is_empty() {
                permissions.push(json!({
                    "action": { "type": "USE" },
                    "edctype": FLAT_PERMISSION_TYPE
                }));
            }
            for permission in &mut permissions {
                if let Some(obj) = permission.as_object_mut() {
                    obj.insert("target".to_string(), json!(asset));
                }
            }
        }
        json!({
            "uid": policy_id,
            "permissions": permissions,
            "@type": { "@policytype": "set" }
        })
    }

    fn contract_body(&self, contract_id: &str, policy_id: &str, asset_id: &str) -> Value {
        json!({
            "id": contract_id,
            "accessPolicyId": policy_id,
            "contractPolicyId": policy_id,
            "criteria": [{
                "operandLeft": "asset:prop:id",
                "operator": "=",
                "operandRight": asset_id
            }]
        })
    }
}
