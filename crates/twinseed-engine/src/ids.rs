//! Identifier generation for shells, submodels and connector assets.

use twinseed_types::CatenaXId;

/// Source of fresh, globally unique URNs.
///
/// Owned by the orchestrator's run state; swapped for a deterministic source
/// in tests.
pub trait IdSource: Send {
    /// Draw a new URN. Two calls never return the same value.
    fn next_urn(&mut self) -> String;
}

/// Random v4 UUIDs rendered as `urn:uuid:…`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_urn(&mut self) -> String {
        uuid::Uuid::new_v4().urn().to_string()
    }
}

/// Counter-based ids (`{prefix}{n}`), for reproducible plans.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdSource for SequentialIds {
    fn next_urn(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

/// Connector asset id for a submodel: `{catenaXId}-{submodelId}`.
#[must_use]
pub fn asset_id(catenax_id: &CatenaXId, submodel_id: &str) -> String {
    format!("{catenax_id}-{submodel_id}")
}

/// Per-asset policy definition id derived from the selected policy.
#[must_use]
pub fn asset_policy_id(policy_id: &str, asset_id: &str) -> String {
    format!("{policy_id}-{asset_id}")
}
