//! Provisioning YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::ProvisionConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error if any referenced environment variable is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                if !errors.iter().any(|e| e == var_name) {
                    errors.push(var_name.to_string());
                }
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", errors.join(", "));
    }

    Ok(result)
}

/// Parse a provisioning YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<ProvisionConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: ProvisionConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse provisioning YAML")?;
    Ok(config)
}

/// Parse a provisioning YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<ProvisionConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read provisioning file: {}", path.display()))?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{
        ConnectorSchemaKind, PartitionStrategyKind, RegistrySchemaKind, DEFAULT_POLICY_ID,
    };

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TS_TEST_HOST", "registry.example.com");
        let input = "url: https://${TS_TEST_HOST}\npage_size: 50";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("registry.example.com"));
        assert!(!result.contains("${TS_TEST_HOST}"));
        std::env::remove_var("TS_TEST_HOST");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "url: http://localhost:4243";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported_once() {
        let input = "${TS_MISSING_X} and ${TS_MISSING_Y} and ${TS_MISSING_X}";
        let err = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err.contains("TS_MISSING_X"));
        assert!(err.contains("TS_MISSING_Y"));
        assert_eq!(err.matches("TS_MISSING_X").count(), 1);
    }

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        std::env::set_var("TS_TEST_API_KEY", "secret");
        let yaml = r#"
version: "1.0"
name: local
input: testdata/CX_Testdata.json
registry:
  url: http://localhost:4243
connector:
  api_key: ${TS_TEST_API_KEY}
providers:
  - name: provider-a
    submodel_url: http://submodel-a
    connector_url: http://edc-a
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.connector.api_key, "secret");
        assert_eq!(config.connector.api_key_header, "X-Api-Key");
        assert_eq!(config.connector.management_path, "/management/v2");
        assert_eq!(config.connector.schema, ConnectorSchemaKind::Dsp);
        assert_eq!(config.registry.schema, RegistrySchemaKind::Legacy);
        assert_eq!(config.registry.page_size, 50);
        assert_eq!(config.partitioning.strategy, PartitionStrategyKind::Bpn);
        assert_eq!(config.policy.default_id, DEFAULT_POLICY_ID);
        assert_eq!(config.resources.max_retries, 5);
        assert_eq!(config.resources.parallelism, 1);
        assert!(config.setup.policies);
        assert!(config.setup.registry_asset);
        assert!(!config.fault_injection.enabled);
        std::env::remove_var("TS_TEST_API_KEY");
    }

    #[test]
    fn test_parse_unknown_strategy_errors() {
        let yaml = r#"
version: "1.0"
name: local
input: data.json
registry:
  url: http://localhost:4243
connector:
  api_key: key
providers: []
partitioning:
  strategy: random
"#;
        let err = parse_config_str(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("unknown variant"));
    }

    #[test]
    fn test_parse_config_file_not_found() {
        let result = parse_config(Path::new("/nonexistent/provision.yaml"));
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Failed to read provisioning file"));
    }
}
