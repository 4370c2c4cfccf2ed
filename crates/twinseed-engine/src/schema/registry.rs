//! Shell and submodel descriptor bodies for the twin registry.

use serde_json::{json, Value};
use twinseed_types::{DigitalTwin, SubmodelDescriptor};

use crate::config::types::RegistrySchemaKind;

/// Body builders for one registry generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySchema {
    kind: RegistrySchemaKind,
}

impl RegistrySchema {
    #[must_use]
    pub fn new(kind: RegistrySchemaKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn kind(&self) -> RegistrySchemaKind {
        self.kind
    }

    /// Shell descriptor for `twin` including all of its submodel descriptors.
    #[must_use]
    pub fn shell_body(&self, twin: &DigitalTwin) -> Value {
        let descriptors: Vec<Value> = twin
            .descriptors()
            .iter()
            .map(|d| self.descriptor_body(d))
            .collect();

        match self.kind {
            RegistrySchemaKind::Legacy => {
                let specific: Vec<Value> = twin
                    .specific_asset_ids()
                    .iter()
                    .map(|id| json!({ "key": id.name, "value": id.value }))
                    .collect();
                json!({
                    "description": [],
                    "globalAssetId": { "value": [twin.global_asset_id.as_str()] },
                    "idShort": twin.id_short(),
                    "identification": twin.shell_id,
                    "specificAssetIds": specific,
                    "submodelDescriptors": descriptors
                })
            }
            RegistrySchemaKind::Aas3 => {
                let specific: Vec<Value> = twin
                    .specific_asset_ids()
                    .iter()
                    .map(|id| json!({ "name": id.name, "value": id.value }))
                    .collect();
                json!({
                    "description": [],
                    "globalAssetId": twin.global_asset_id.as_str(),
                    "idShort": twin.id_short(),
                    "id": twin.shell_id,
                    "specificAssetIds": specific,
                    "submodelDescriptors": descriptors
                })
            }
        }
    }

    #[must_use]
    pub fn descriptor_body(&self, descriptor: &SubmodelDescriptor) -> Value {
        match self.kind {
            RegistrySchemaKind::Legacy => json!({
                "description": [],
                "idShort": descriptor.id_short,
                "identification": descriptor.id,
                "semanticId": { "value": [descriptor.semantic_id] },
                "endpoints": [{
                    "interface": "HTTP",
                    "protocolInformation": {
                        "endpointAddress": descriptor.endpoint_address,
                        "endpointProtocol": "AAS/IDS",
                        "endpointProtocolVersion": "0.1",
                        "subprotocol": "IDS",
                        "subprotocolBody": "TDB",
                        "subprotocolBodyEncoding": "plain"
                    }
                }]
            }),
            RegistrySchemaKind::Aas3 => json!({
                "description": [],
                "idShort": descriptor.id_short,
                "id": descriptor.id,
                "semanticId": {
                    "type": "ExternalReference",
                    "keys": [{ "type": "GlobalReference", "value": descriptor.semantic_id }]
                },
                "endpoints": [{
                    "interface": "SUBMODEL-3.0",
                    "protocolInformation": {
                        "href": descriptor.endpoint_address,
                        "endpointProtocol": "HTTP",
                        "endpointProtocolVersion": ["1.1"],
                        "subprotocol": "DSP",
                        "subprotocolBody": format!(
                            "id={};dspEndpoint={}",
                            descriptor.asset_id, descriptor.connector_url
                        ),
                        "subprotocolBodyEncoding": "plain"
                    }
                }]
            }),
        }
    }

    /// Shell ids on one page of a registry listing.
    #[must_use]
    pub fn listed_shell_ids(&self, page: &Value) -> Vec<String> {
        let (collection, field) = match self.kind {
            RegistrySchemaKind::Legacy => ("items", "identification"),
            RegistrySchemaKind::Aas3 => ("result", "id"),
        };
        page.get(collection)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(field).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
