//! Submodel endpoint address construction.
//!
//! Addresses always use the public connector URL of the assigned provider.
//! Incident BPNs get a deliberately unresolvable host so consumers exercise
//! their error path; certificate statistics point at the ESR service when one
//! is configured.

use twinseed_types::{AspectKind, Bpn, CatenaXId, ProvisioningTarget};

use crate::config::types::{FaultInjectionConfig, ProvisionConfig, RegistrySchemaKind};

#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    registry_schema: RegistrySchemaKind,
    esr_url: Option<String>,
    fault_injection: FaultInjectionConfig,
}

impl EndpointBuilder {
    #[must_use]
    pub fn new(
        registry_schema: RegistrySchemaKind,
        esr_url: Option<String>,
        fault_injection: FaultInjectionConfig,
    ) -> Self {
        Self {
            registry_schema,
            esr_url,
            fault_injection,
        }
    }

    #[must_use]
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self::new(
            config.registry.schema,
            config.esr_url.clone(),
            config.fault_injection.clone(),
        )
    }

    /// ESR submodel URL for a twin, when an ESR service is configured.
    #[must_use]
    pub fn esr_address(&self, catenax_id: &CatenaXId) -> Option<String> {
        self.esr_url
            .as_deref()
            .map(|esr| format!("{esr}/{catenax_id}/asBuilt/ISO14001/submodel"))
    }

    #[must_use]
    pub fn esr_enabled(&self) -> bool {
        self.esr_url.is_some()
    }

    /// Address consumers use to fetch one submodel.
    #[must_use]
    pub fn endpoint_address(
        &self,
        catenax_id: &CatenaXId,
        bpn: &Bpn,
        aspect: AspectKind,
        submodel_id: &str,
        target: &ProvisioningTarget,
    ) -> String {
        if self.fault_injection.is_incident(bpn.as_str()) {
            return self.address_on(&self.fault_injection.invalid_host, catenax_id, submodel_id);
        }
        if aspect == AspectKind::EsrCertificateStateStatistic {
            if let Some(esr) = self.esr_address(catenax_id) {
                return esr;
            }
        }
        self.address_on(&target.connector_url, catenax_id, submodel_id)
    }

    fn address_on(&self, base: &str, catenax_id: &CatenaXId, submodel_id: &str) -> String {
        match self.registry_schema {
            RegistrySchemaKind::Legacy => format!(
                "{base}/{catenax_id}-{submodel_id}/submodel?content=value&extent=withBlobValue"
            ),
            RegistrySchemaKind::Aas3 => {
                format!("{base}/shells/{catenax_id}/submodels/{submodel_id}/submodel")
            }
        }
    }
}
