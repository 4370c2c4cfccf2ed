//! Semantic validation for parsed provisioning configuration values.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::config::types::{PartitionStrategyKind, ProviderConfig, ProvisionConfig};

fn validate_url(url: &str, context: &str, errors: &mut Vec<String>) {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        errors.push(format!("{context}: URL must not be empty"));
        return;
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        errors.push(format!(
            "{context}: URL '{url}' must start with http:// or https://"
        ));
    }
    if trimmed.ends_with('/') {
        errors.push(format!("{context}: URL '{url}' must not end with '/'"));
    }
}

fn validate_provider(provider: &ProviderConfig, index: usize, errors: &mut Vec<String>) {
    let context = format!("providers[{index}]");
    if provider.name.trim().is_empty() {
        errors.push(format!("{context}: name must not be empty"));
    }
    validate_url(&provider.submodel_url, &format!("{context}.submodel_url"), errors);
    validate_url(&provider.connector_url, &format!("{context}.connector_url"), errors);
    if let Some(ref url) = provider.submodel_upload_url {
        validate_url(url, &format!("{context}.submodel_upload_url"), errors);
    }
    if let Some(ref url) = provider.connector_upload_url {
        validate_url(url, &format!("{context}.connector_upload_url"), errors);
    }
}

/// Validate a parsed provisioning configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the configuration.
pub fn validate_config(config: &ProvisionConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported provisioning version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.name.trim().is_empty() {
        errors.push("Run name must not be empty".to_string());
    }

    if config.input.as_os_str().is_empty() {
        errors.push("Input document path must not be empty".to_string());
    }

    validate_url(&config.registry.url, "registry.url", &mut errors);
    if let Some(ref url) = config.registry.upload_url {
        validate_url(url, "registry.upload_url", &mut errors);
    }
    if config.registry.page_size == 0 {
        errors.push("registry.page_size must be at least 1".to_string());
    }

    if config.connector.api_key.trim().is_empty() {
        errors.push("connector.api_key must not be empty".to_string());
    }
    if config.connector.api_key_header.trim().is_empty() {
        errors.push("connector.api_key_header must not be empty".to_string());
    }
    if !config.connector.management_path.starts_with('/') {
        errors.push(format!(
            "connector.management_path '{}' must start with '/'",
            config.connector.management_path
        ));
    }

    if config.providers.is_empty() {
        errors.push("At least one provider must be configured".to_string());
    }

    let mut names = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        validate_provider(provider, i, &mut errors);
        if !names.insert(provider.name.as_str()) {
            errors.push(format!("Duplicate provider name '{}'", provider.name));
        }
    }

    if let Some(ref default) = config.partitioning.default_provider {
        if !names.contains(default.as_str()) {
            errors.push(format!(
                "partitioning.default_provider '{default}' is not a configured provider"
            ));
        }
    }
    for (bpn, provider) in &config.partitioning.bpn_map {
        if !names.contains(provider.as_str()) {
            errors.push(format!(
                "partitioning.bpn_map: BPN '{bpn}' maps to unknown provider '{provider}'"
            ));
        }
    }
    if config.partitioning.strategy == PartitionStrategyKind::RoundRobin
        && !config.partitioning.bpn_map.is_empty()
    {
        tracing::warn!("partitioning.bpn_map is ignored by the round_robin strategy");
    }

    if config.policy.default_id.trim().is_empty() {
        errors.push("policy.default_id must not be empty".to_string());
    }

    if let Some(ref esr) = config.esr_url {
        validate_url(esr, "esr_url", &mut errors);
    }

    if config.fault_injection.enabled {
        if config.fault_injection.incident_bpns.is_empty() {
            errors.push(
                "fault_injection.enabled requires at least one incident BPN".to_string(),
            );
        }
        validate_url(
            &config.fault_injection.invalid_host,
            "fault_injection.invalid_host",
            &mut errors,
        );
    }

    if config.setup.registry_asset && config.setup.registry_asset_id.trim().is_empty() {
        errors.push("setup.registry_asset_id must not be empty".to_string());
    }

    if config.resources.parallelism == 0 {
        errors.push("resources.parallelism must be at least 1".to_string());
    }
    if config.resources.request_timeout_seconds == 0 {
        errors.push("resources.request_timeout_seconds must be > 0".to_string());
    }
    if config.resources.reset_max_rounds == 0 {
        errors.push("resources.reset_max_rounds must be at least 1".to_string());
    }
    if config.resources.deadline_seconds == Some(0) {
        errors.push("resources.deadline_seconds must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Provisioning config validation failed:\n  - {}", errors.join("\n  - "));
    }
}
