//! Assignment of submodels to providers.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::config::types::{PartitionStrategyKind, ProvisionConfig};

/// Maps a submodel to the index of the provider it is published to.
///
/// Pure: the same `(sequence, bpn)` always yields the same index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partitioner {
    /// `sequence % targets`.
    RoundRobin { targets: usize },
    /// Explicit BPN mapping with a fallback provider.
    BpnKeyed {
        map: HashMap<String, usize>,
        default: usize,
    },
}

impl Partitioner {
    #[must_use]
    pub fn round_robin(targets: usize) -> Self {
        Self::RoundRobin {
            targets: targets.max(1),
        }
    }

    /// Build the partitioner selected in `config`, resolving provider names to indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the BPN map or default provider names an unknown provider.
    pub fn from_config(config: &ProvisionConfig) -> Result<Self> {
        let index_of = |name: &str| {
            config
                .providers
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| anyhow!("unknown provider '{name}' in partitioning config"))
        };

        match config.partitioning.strategy {
            PartitionStrategyKind::RoundRobin => Ok(Self::round_robin(config.providers.len())),
            PartitionStrategyKind::Bpn => {
                let default = match config.partitioning.default_provider {
                    Some(ref name) => index_of(name)?,
                    None => 0,
                };
                let map = config
                    .partitioning
                    .bpn_map
                    .iter()
                    .map(|(bpn, provider)| Ok((bpn.clone(), index_of(provider)?)))
                    .collect::<Result<HashMap<_, _>>>()?;
                Ok(Self::BpnKeyed { map, default })
            }
        }
    }

    /// Target index for the submodel with run-wide position `sequence`, owned by `bpn`.
    #[must_use]
    pub fn assign(&self, sequence: u64, bpn: &str) -> usize {
        match self {
            // Lossless: the remainder is below `targets`.
            #[allow(clippy::cast_possible_truncation)]
            Self::RoundRobin { targets } => (sequence % *targets as u64) as usize,
            Self::BpnKeyed { map, default } => map.get(bpn).copied().unwrap_or(*default),
        }
    }

    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Self::RoundRobin { .. } => "round_robin",
            Self::BpnKeyed { .. } => "bpn",
        }
    }
}
