//! Provider instances submodels can be routed to.

use serde::{Deserialize, Serialize};

/// One configured provider: a content server plus the connector that exposes it.
///
/// Content is uploaded through the `*_upload_url`s; everything a consumer
/// will later dereference is built from the display URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningTarget {
    pub name: String,
    pub submodel_upload_url: String,
    pub submodel_url: String,
    pub connector_upload_url: String,
    pub connector_url: String,
}

impl ProvisioningTarget {
    /// URL the submodel content is uploaded to.
    #[must_use]
    pub fn content_upload_url(&self, submodel_id: &str) -> String {
        format!("{}/data/{submodel_id}", self.submodel_upload_url)
    }

    /// URL the connector's data address points at for a submodel.
    #[must_use]
    pub fn content_display_url(&self, submodel_id: &str) -> String {
        format!("{}/data/{submodel_id}", self.submodel_url)
    }
}
