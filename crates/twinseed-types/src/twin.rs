//! Registry-side twin model: shells, specific asset ids and submodel descriptors.

use serde::{Deserialize, Serialize};

use crate::ident::{Bpn, CatenaXId};
use crate::semantic::AspectKind;

/// Name of the specific asset id every twin carries for its owner.
pub const MANUFACTURER_ID: &str = "manufacturerId";

/// Name/value pair identifying a twin beyond its global asset id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecificAssetId {
    pub name: String,
    pub value: String,
}

impl SpecificAssetId {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Pointer from a twin to one of its submodels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmodelDescriptor {
    /// Generated submodel id (`urn:uuid:…`).
    pub id: String,
    /// Short name taken from the semantic-type key.
    pub id_short: String,
    /// Full semantic-type key as found in the document.
    pub semantic_id: String,
    pub aspect: AspectKind,
    /// Public address consumers use to fetch the submodel.
    pub endpoint_address: String,
    /// Connector asset id (`{catenaXId}-{submodelId}`).
    pub asset_id: String,
    /// Public connector URL of the assigned provider.
    pub connector_url: String,
    /// Name of the provider the submodel was routed to.
    pub target: String,
}

/// One twin per distinct `catenaXId`, built up while its aspects are transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigitalTwin {
    pub global_asset_id: CatenaXId,
    /// Registry identification of the shell (`urn:uuid:…`).
    pub shell_id: String,
    pub bpn: Bpn,
    id_short: Option<String>,
    specific_asset_ids: Vec<SpecificAssetId>,
    descriptors: Vec<SubmodelDescriptor>,
}

impl DigitalTwin {
    /// Create a twin owned by `bpn`. The `manufacturerId` specific asset id is added up front.
    #[must_use]
    pub fn new(global_asset_id: CatenaXId, shell_id: impl Into<String>, bpn: Bpn) -> Self {
        let manufacturer = SpecificAssetId::new(MANUFACTURER_ID, bpn.as_str());
        Self {
            global_asset_id,
            shell_id: shell_id.into(),
            bpn,
            id_short: None,
            specific_asset_ids: vec![manufacturer],
            descriptors: Vec::new(),
        }
    }

    /// Human-readable short name, empty until an identity aspect supplied one.
    #[must_use]
    pub fn id_short(&self) -> &str {
        self.id_short.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn has_id_short(&self) -> bool {
        self.id_short.is_some()
    }

    /// Set the short name unless one was already set. Whitespace is stripped.
    ///
    /// Returns `true` if the name was taken.
    pub fn set_id_short_once(&mut self, name: &str) -> bool {
        if self.id_short.is_some() {
            return false;
        }
        self.id_short = Some(name.chars().filter(|c| !c.is_whitespace()).collect());
        true
    }

    #[must_use]
    pub fn specific_asset_ids(&self) -> &[SpecificAssetId] {
        &self.specific_asset_ids
    }

    /// Append a specific asset id, keeping the set free of duplicates.
    ///
    /// Returns `false` if an identical pair was already present.
    pub fn add_specific_asset_id(&mut self, id: SpecificAssetId) -> bool {
        if self.specific_asset_ids.contains(&id) {
            return false;
        }
        self.specific_asset_ids.push(id);
        true
    }

    #[must_use]
    pub fn descriptors(&self) -> &[SubmodelDescriptor] {
        &self.descriptors
    }

    pub fn push_descriptor(&mut self, descriptor: SubmodelDescriptor) {
        self.descriptors.push(descriptor);
    }
}
