//! Per-call publication results.
//!
//! [`PublishResult`] records what happened to one HTTP call against a
//! downstream service. Results are never retried once recorded; they are
//! aggregated into the run summary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of artifact a call creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Submodel content on a content server.
    Submodel,
    /// Connector asset.
    Asset,
    /// Connector policy definition.
    Policy,
    /// Connector contract definition.
    ContractDefinition,
    /// Shell descriptor in the registry.
    Shell,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submodel => "submodel",
            Self::Asset => "asset",
            Self::Policy => "policy",
            Self::ContractDefinition => "contract_definition",
            Self::Shell => "shell",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    /// The service accepted the artifact (2xx).
    Published,
    /// The artifact was found to exist already and creation was skipped.
    Existing,
    /// The service answered with a non-2xx status.
    Rejected,
    /// The service could not be reached within the retry budget.
    Unreachable,
}

impl PublishOutcome {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Published | Self::Existing)
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Published => "published",
            Self::Existing => "existing",
            Self::Rejected => "rejected",
            Self::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

/// Result of a single publication call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub artifact: ArtifactKind,
    /// Id of the artifact (submodel id, asset id, policy id, shell id).
    pub entity_id: String,
    /// Provider the call went to; `None` for registry calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub url: String,
    /// HTTP status, absent when the service was never reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub outcome: PublishOutcome,
    pub attempts: u32,
    /// Response body or transport error message, captured on failure only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PublishResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_success_classification() {
        assert!(PublishOutcome::Published.is_success());
        assert!(PublishOutcome::Existing.is_success());
        assert!(!PublishOutcome::Rejected.is_success());
        assert!(!PublishOutcome::Unreachable.is_success());
    }

    #[test]
    fn artifact_kinds_sort_in_publication_order() {
        assert!(ArtifactKind::Submodel < ArtifactKind::Asset);
        assert!(ArtifactKind::ContractDefinition < ArtifactKind::Shell);
        assert_eq!(ArtifactKind::ContractDefinition.to_string(), "contract_definition");
    }

    #[test]
    fn failed_result_serializes_detail_and_status() {
        let result = PublishResult {
            artifact: ArtifactKind::Asset,
            entity_id: "urn:uuid:AAA-urn:uuid:1".into(),
            target: Some("provider-a".into()),
            url: "http://edc/management/v2/assets".into(),
            status: Some(409),
            outcome: PublishOutcome::Rejected,
            attempts: 1,
            detail: Some("duplicate".into()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], 409);
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["detail"], "duplicate");
        assert!(!result.is_success());
    }

    #[test]
    fn unreachable_result_omits_status() {
        let result = PublishResult {
            artifact: ArtifactKind::Shell,
            entity_id: "urn:uuid:shell".into(),
            target: None,
            url: "http://registry/shell-descriptors".into(),
            status: None,
            outcome: PublishOutcome::Unreachable,
            attempts: 6,
            detail: Some("connection refused".into()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("status").is_none());
        assert!(json.get("target").is_none());
    }
}
