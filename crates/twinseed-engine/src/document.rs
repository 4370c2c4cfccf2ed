//! Test-data document loading.
//!
//! The document is a JSON object whose container key maps to an ordered array
//! of part records. Structural problems are fatal and reported as
//! [`DocumentError`]; anything below the record level (missing nested fields in
//! an aspect payload) is the transformer's business.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use twinseed_types::{Bpn, CatenaXId};

/// Key of the record container in the test-data document.
pub const CONTAINER_KEY: &str = "https://catenax.io/schema/TestDataContainer/1.0.0";

/// Optional top-level section with named policy-definition templates.
pub const POLICIES_KEY: &str = "policies";

/// Structural input errors. Any of these aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read test-data document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("test-data document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("test-data document must be a JSON object")]
    NotAnObject,

    #[error("test-data document has no '{0}' container")]
    MissingContainer(String),

    #[error("container '{0}' must be an array of records")]
    ContainerNotArray(String),

    #[error("record {index} is not a JSON object")]
    RecordNotObject { index: usize },

    #[error("record {index} is missing required string field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("'{POLICIES_KEY}' section must be an object of policy definitions")]
    PoliciesNotObject,
}

/// One entry of the record container.
#[derive(Debug, Clone, PartialEq)]
pub struct PartRecord {
    /// Position in the container, for diagnostics.
    pub index: usize,
    pub catenax_id: CatenaXId,
    pub bpn: Bpn,
    /// Explicit policy id overriding the configured default.
    pub policy: Option<String>,
    /// Remaining keys in document order with their raw values.
    pub entries: Vec<(String, Value)>,
}

impl PartRecord {
    fn from_object(index: usize, object: &Map<String, Value>) -> Result<Self, DocumentError> {
        let catenax_id = object
            .get("catenaXId")
            .and_then(Value::as_str)
            .ok_or(DocumentError::MissingField {
                index,
                field: "catenaXId",
            })?;
        let bpn = object
            .get("bpnl")
            .or_else(|| object.get("bpn"))
            .and_then(Value::as_str)
            .ok_or(DocumentError::MissingField {
                index,
                field: "bpnl",
            })?;
        let policy = object
            .get("policy")
            .and_then(Value::as_str)
            .map(str::to_string);

        let entries = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "catenaXId" | "bpnl" | "bpn" | "policy"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            index,
            catenax_id: CatenaXId::new(catenax_id),
            bpn: Bpn::new(bpn),
            policy,
            entries,
        })
    }
}

/// Parsed, read-only test-data document.
#[derive(Debug, Clone, Default)]
pub struct TestDataDocument {
    records: Vec<PartRecord>,
    policies: IndexMap<String, Value>,
}

impl TestDataDocument {
    /// Read and parse a document from disk.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] if the file cannot be read or is structurally invalid.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&content)
    }

    /// Parse a document from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] if the JSON is malformed or structurally invalid.
    pub fn parse_str(content: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    /// Build a document from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] if the value is structurally invalid.
    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        let root = value.as_object().ok_or(DocumentError::NotAnObject)?;
        let container = root
            .get(CONTAINER_KEY)
            .ok_or_else(|| DocumentError::MissingContainer(CONTAINER_KEY.to_string()))?
            .as_array()
            .ok_or_else(|| DocumentError::ContainerNotArray(CONTAINER_KEY.to_string()))?;

        let records = container
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let object = record
                    .as_object()
                    .ok_or(DocumentError::RecordNotObject { index })?;
                PartRecord::from_object(index, object)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let policies = match root.get(POLICIES_KEY) {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, definition)| (name.clone(), definition.clone()))
                .collect(),
            Some(_) => return Err(DocumentError::PoliciesNotObject),
        };

        Ok(Self { records, policies })
    }

    #[must_use]
    pub fn records(&self) -> &[PartRecord] {
        &self.records
    }

    /// Named policy-definition templates from the document.
    #[must_use]
    pub fn policies(&self) -> &IndexMap<String, Value> {
        &self.policies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(records: Value) -> Value {
        json!({ CONTAINER_KEY: records })
    }

    #[test]
    fn parses_records_in_order_with_scalar_fields_split_off() {
        let value = document(json!([
            {
                "catenaXId": "urn:uuid:AAA",
                "bpnl": "BPNL1",
                "SerialPart": [{"catenaXId": "urn:uuid:AAA"}],
                "AssemblyRelationship": [{"childItems": []}]
            },
            {
                "catenaXId": "urn:uuid:BBB",
                "bpn": "BPNL2",
                "policy": "custom-policy",
                "Batch": [{}]
            }
        ]));
        let doc = TestDataDocument::from_value(&value).unwrap();
        assert_eq!(doc.records().len(), 2);

        let first = &doc.records()[0];
        assert_eq!(first.catenax_id.as_str(), "urn:uuid:AAA");
        assert_eq!(first.bpn.as_str(), "BPNL1");
        assert!(first.policy.is_none());
        let keys: Vec<&str> = first.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["SerialPart", "AssemblyRelationship"]);

        let second = &doc.records()[1];
        assert_eq!(second.bpn.as_str(), "BPNL2");
        assert_eq!(second.policy.as_deref(), Some("custom-policy"));
        assert_eq!(second.index, 1);
    }

    #[test]
    fn missing_container_is_fatal() {
        let err = TestDataDocument::from_value(&json!({"other": []})).unwrap_err();
        assert!(matches!(err, DocumentError::MissingContainer(_)));
    }

    #[test]
    fn container_must_be_array() {
        let err = TestDataDocument::from_value(&document(json!({}))).unwrap_err();
        assert!(matches!(err, DocumentError::ContainerNotArray(_)));
    }

    #[test]
    fn record_without_catenax_id_is_fatal() {
        let err =
            TestDataDocument::from_value(&document(json!([{"bpnl": "BPNL1"}]))).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::MissingField {
                index: 0,
                field: "catenaXId"
            }
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = TestDataDocument::parse_str("{not json").unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn policies_section_is_read_in_order() {
        let value = json!({
            CONTAINER_KEY: [],
            "policies": {
                "b-policy": {"@id": "b-policy"},
                "a-policy": {"@id": "a-policy"}
            }
        });
        let doc = TestDataDocument::from_value(&value).unwrap();
        let names: Vec<&String> = doc.policies().keys().collect();
        assert_eq!(names, vec!["b-policy", "a-policy"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = TestDataDocument::load(Path::new("/nonexistent/testdata.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/testdata.json"));
    }
}
