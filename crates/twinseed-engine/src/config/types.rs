//! Provisioning configuration model deserialized from YAML.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use twinseed_types::ProvisioningTarget;

pub const DEFAULT_POLICY_ID: &str = "default-policy";
pub const DEFAULT_INVALID_HOST: &str = "http://idonotexist";
pub const DEFAULT_REGISTRY_ASSET_ID: &str = "registry-asset";

/// Top-level provisioning configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionConfig {
    pub version: String,
    /// Label used in logs and the run summary.
    pub name: String,
    /// Path to the test-data document.
    pub input: PathBuf,
    pub registry: RegistryConfig,
    pub connector: ConnectorConfig,
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub partitioning: PartitioningConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub esr_url: Option<String>,
    #[serde(default)]
    pub fault_injection: FaultInjectionConfig,
    #[serde(default)]
    pub setup: SetupConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

/// Shell descriptor schema generation of the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySchemaKind {
    /// `/registry/shell-descriptors` with `identification` fields.
    #[default]
    Legacy,
    /// AAS 3.0 `/shell-descriptors`.
    Aas3,
}

impl RegistrySchemaKind {
    /// Path of the shell-descriptor collection below the registry URL.
    #[must_use]
    pub fn descriptor_path(self) -> &'static str {
        match self {
            Self::Legacy => "/registry/shell-descriptors",
            Self::Aas3 => "/shell-descriptors",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Public registry URL.
    pub url: String,
    /// URL used for uploads; defaults to `url`.
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub schema: RegistrySchemaKind,
    /// Opaque bearer token sent with registry calls.
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl RegistryConfig {
    #[must_use]
    pub fn effective_upload_url(&self) -> &str {
        self.upload_url.as_deref().unwrap_or(&self.url)
    }

    /// Shell-descriptor collection URL used for publishing and reset.
    #[must_use]
    pub fn descriptors_url(&self) -> String {
        format!(
            "{}{}",
            self.effective_upload_url(),
            self.schema.descriptor_path()
        )
    }
}

/// Connector management API schema generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorSchemaKind {
    /// Flat `asset:prop:*` properties.
    Flat,
    /// JSON-LD `@context` / `dataAddress` form.
    #[default]
    Dsp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    pub api_key: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default)]
    pub schema: ConnectorSchemaKind,
    #[serde(default = "default_management_path")]
    pub management_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub submodel_url: String,
    #[serde(default)]
    pub submodel_upload_url: Option<String>,
    pub connector_url: String,
    #[serde(default)]
    pub connector_upload_url: Option<String>,
}

impl ProviderConfig {
    /// Resolve into a target, filling upload URLs from the display URLs.
    #[must_use]
    pub fn to_target(&self) -> ProvisioningTarget {
        ProvisioningTarget {
            name: self.name.clone(),
            submodel_upload_url: self
                .submodel_upload_url
                .clone()
                .unwrap_or_else(|| self.submodel_url.clone()),
            submodel_url: self.submodel_url.clone(),
            connector_upload_url: self
                .connector_upload_url
                .clone()
                .unwrap_or_else(|| self.connector_url.clone()),
            connector_url: self.connector_url.clone(),
        }
    }
}

/// How submodels are spread across providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategyKind {
    RoundRobin,
    #[default]
    Bpn,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartitioningConfig {
    #[serde(default)]
    pub strategy: PartitionStrategyKind,
    /// BPN → provider name.
    #[serde(default)]
    pub bpn_map: BTreeMap<String, String>,
    /// Provider used for unmapped BPNs; the first provider when unset.
    #[serde(default)]
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_policy_id")]
    pub default_id: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_id: default_policy_id(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Only records owned by these BPNs are provisioned. Empty means all.
    #[serde(default)]
    pub bpns: Vec<String>,
}

impl FilterConfig {
    #[must_use]
    pub fn allows(&self, bpn: &str) -> bool {
        self.bpns.is_empty() || self.bpns.iter().any(|b| b == bpn)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaultInjectionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub incident_bpns: Vec<String>,
    #[serde(default = "default_invalid_host")]
    pub invalid_host: String,
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            incident_bpns: Vec::new(),
            invalid_host: default_invalid_host(),
        }
    }
}

impl FaultInjectionConfig {
    /// Whether submodels of `bpn` must point at the unresolvable host.
    #[must_use]
    pub fn is_incident(&self, bpn: &str) -> bool {
        self.enabled && self.incident_bpns.iter().any(|b| b == bpn)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetupConfig {
    /// Ensure named policy definitions exist on every connector.
    #[serde(default = "default_true")]
    pub policies: bool,
    /// Ensure the registry asset exists on every connector.
    #[serde(default = "default_true")]
    pub registry_asset: bool,
    #[serde(default = "default_registry_asset_id")]
    pub registry_asset_id: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            policies: true,
            registry_asset: true,
            registry_asset_id: default_registry_asset_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Retries after the first attempt for retryable transport failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Twins published concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    /// Stop scheduling new twins after this many seconds.
    #[serde(default)]
    pub deadline_seconds: Option<u64>,
    /// Upper bound on list-then-delete rounds per collection during reset.
    #[serde(default = "default_reset_max_rounds")]
    pub reset_max_rounds: u32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            request_timeout_seconds: default_request_timeout_seconds(),
            parallelism: default_parallelism(),
            deadline_seconds: None,
            reset_max_rounds: default_reset_max_rounds(),
        }
    }
}

impl ProvisionConfig {
    /// Providers in configuration order, resolved to targets.
    #[must_use]
    pub fn targets(&self) -> Vec<ProvisioningTarget> {
        self.providers.iter().map(ProviderConfig::to_target).collect()
    }
}

fn default_page_size() -> u32 {
    50
}

fn default_api_key_header() -> String {
    "X-Api-Key".to_string()
}

fn default_management_path() -> String {
    "/management/v2".to_string()
}

fn default_policy_id() -> String {
    DEFAULT_POLICY_ID.to_string()
}

fn default_invalid_host() -> String {
    DEFAULT_INVALID_HOST.to_string()
}

fn default_registry_asset_id() -> String {
    DEFAULT_REGISTRY_ASSET_ID.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_parallelism() -> u32 {
    1
}

fn default_reset_max_rounds() -> u32 {
    100
}
