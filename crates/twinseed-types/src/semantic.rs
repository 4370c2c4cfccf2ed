//! Semantic-type classification for test-data record keys.
//!
//! Every key of a part record is mapped to a [`KeyClass`] through an explicit
//! table. Only [`KeyClass::Aspect`] keys become submodels; everything else is
//! skipped, and [`KeyClass::Unrecognized`] is reported so a typo in a fixture
//! does not silently vanish.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar record fields that never describe a submodel.
pub const SCALAR_FIELDS: &[&str] = &["catenaXId", "bpnl", "bpn", "policy"];

const CONTAINER_MARKER: &str = "PlainObject";

/// Known submodel aspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectKind {
    SerialPart,
    Batch,
    PartAsPlanned,
    JustInSequencePart,
    SingleLevelBomAsBuilt,
    SingleLevelBomAsPlanned,
    SingleLevelUsageAsBuilt,
    PartSiteInformationAsPlanned,
    EsrCertificateStateStatistic,
    MaterialForRecycling,
    ProductDescription,
    PhysicalDimension,
    CertificateOfDestruction,
    DataIntegrity,
    PartDetails,
    TractionBatteryCode,
}

/// What an aspect contributes to its twin beyond its own submodel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRole {
    /// Carries `partTypeInformation` and local identifiers of the part.
    Identity,
    /// Bill-of-material or usage relationship to other parts.
    Relationship,
    /// Certificate statistics served from a dedicated endpoint.
    Certificate,
    /// Any other descriptive aspect.
    Descriptive,
}

impl AspectKind {
    /// Resolve an aspect from the short name of its semantic id.
    ///
    /// Historical aliases (`SerialPartTypization`, `AssemblyPartRelationship`,
    /// `AssemblyRelationship`) resolve to their current aspect.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "SerialPart" | "SerialPartTypization" => Self::SerialPart,
            "Batch" => Self::Batch,
            "PartAsPlanned" => Self::PartAsPlanned,
            "JustInSequencePart" => Self::JustInSequencePart,
            "SingleLevelBomAsBuilt" | "AssemblyPartRelationship" | "AssemblyRelationship" => {
                Self::SingleLevelBomAsBuilt
            }
            "SingleLevelBomAsPlanned" => Self::SingleLevelBomAsPlanned,
            "SingleLevelUsageAsBuilt" => Self::SingleLevelUsageAsBuilt,
            "PartSiteInformationAsPlanned" => Self::PartSiteInformationAsPlanned,
            "EsrCertificateStateStatistic" => Self::EsrCertificateStateStatistic,
            "MaterialForRecycling" => Self::MaterialForRecycling,
            "ProductDescription" => Self::ProductDescription,
            "PhysicalDimension" => Self::PhysicalDimension,
            "CertificateOfDestruction" => Self::CertificateOfDestruction,
            "DataIntegrity" => Self::DataIntegrity,
            "PartDetails" => Self::PartDetails,
            "TractionBatteryCode" => Self::TractionBatteryCode,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical short name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SerialPart => "SerialPart",
            Self::Batch => "Batch",
            Self::PartAsPlanned => "PartAsPlanned",
            Self::JustInSequencePart => "JustInSequencePart",
            Self::SingleLevelBomAsBuilt => "SingleLevelBomAsBuilt",
            Self::SingleLevelBomAsPlanned => "SingleLevelBomAsPlanned",
            Self::SingleLevelUsageAsBuilt => "SingleLevelUsageAsBuilt",
            Self::PartSiteInformationAsPlanned => "PartSiteInformationAsPlanned",
            Self::EsrCertificateStateStatistic => "EsrCertificateStateStatistic",
            Self::MaterialForRecycling => "MaterialForRecycling",
            Self::ProductDescription => "ProductDescription",
            Self::PhysicalDimension => "PhysicalDimension",
            Self::CertificateOfDestruction => "CertificateOfDestruction",
            Self::DataIntegrity => "DataIntegrity",
            Self::PartDetails => "PartDetails",
            Self::TractionBatteryCode => "TractionBatteryCode",
        }
    }

    #[must_use]
    pub fn role(self) -> AspectRole {
        match self {
            Self::SerialPart | Self::Batch | Self::PartAsPlanned | Self::JustInSequencePart => {
                AspectRole::Identity
            }
            Self::SingleLevelBomAsBuilt
            | Self::SingleLevelBomAsPlanned
            | Self::SingleLevelUsageAsBuilt => AspectRole::Relationship,
            Self::EsrCertificateStateStatistic => AspectRole::Certificate,
            _ => AspectRole::Descriptive,
        }
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one record key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// `catenaXId`, `bpnl`, `bpn` or `policy`.
    Scalar,
    /// Plain-object container marker.
    ContainerMarker,
    /// Shell or business-partner template carried along in the fixture.
    Administrative,
    /// A submodel aspect.
    Aspect(AspectKind),
    /// Anything not in the table.
    Unrecognized,
}

/// Short name of a semantic-type key.
///
/// `urn:bamm:io.catenax.serial_part:1.0.1#SerialPart` → `SerialPart`,
/// `https://catenax.io/schema/SerialPartTypization/1.0.0` → `SerialPartTypization`,
/// `SerialPart` → `SerialPart`.
#[must_use]
pub fn aspect_name(key: &str) -> &str {
    if let Some((_, fragment)) = key.rsplit_once('#') {
        return fragment;
    }
    key.split('/')
        .rev()
        .find(|segment| {
            !segment.is_empty() && !segment.starts_with(|c: char| c.is_ascii_digit())
        })
        .unwrap_or(key)
}

/// Classify a record key.
#[must_use]
pub fn classify_key(key: &str) -> KeyClass {
    if SCALAR_FIELDS.contains(&key) {
        return KeyClass::Scalar;
    }
    if key.contains(CONTAINER_MARKER) {
        return KeyClass::ContainerMarker;
    }
    let name = aspect_name(key);
    if matches!(name, "AAS" | "AAS-shell" | "BPDM") {
        return KeyClass::Administrative;
    }
    AspectKind::from_name(name).map_or(KeyClass::Unrecognized, KeyClass::Aspect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("urn:bamm:io.catenax.serial_part:1.0.1#SerialPart", "SerialPart")]
    #[case("https://catenax.io/schema/SerialPartTypization/1.0.0", "SerialPartTypization")]
    #[case("https://catenax.io/schema/AAS/3.0", "AAS")]
    #[case("Batch", "Batch")]
    fn aspect_name_extracts_short_name(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(aspect_name(key), expected);
    }

    #[rstest]
    #[case("catenaXId", KeyClass::Scalar)]
    #[case("bpnl", KeyClass::Scalar)]
    #[case("policy", KeyClass::Scalar)]
    #[case("https://catenax.io/schema/TestDataContainer/PlainObject/1.0.0", KeyClass::ContainerMarker)]
    #[case("https://catenax.io/schema/AAS/3.0", KeyClass::Administrative)]
    #[case("AAS-shell", KeyClass::Administrative)]
    #[case(
        "urn:bamm:io.catenax.single_level_bom_as_built:1.0.0#SingleLevelBomAsBuilt",
        KeyClass::Aspect(AspectKind::SingleLevelBomAsBuilt)
    )]
    #[case("AssemblyRelationship", KeyClass::Aspect(AspectKind::SingleLevelBomAsBuilt))]
    #[case("urn:bamm:io.catenax.batch:1.0.0#Batch", KeyClass::Aspect(AspectKind::Batch))]
    #[case("urn:bamm:io.catenax.unknown:1.0.0#SomethingElse", KeyClass::Unrecognized)]
    fn classify_key_table(#[case] key: &str, #[case] expected: KeyClass) {
        assert_eq!(classify_key(key), expected);
    }

    #[test]
    fn identity_aspects_carry_identity_role() {
        assert_eq!(AspectKind::SerialPart.role(), AspectRole::Identity);
        assert_eq!(AspectKind::PartAsPlanned.role(), AspectRole::Identity);
        assert_eq!(
            AspectKind::SingleLevelBomAsBuilt.role(),
            AspectRole::Relationship
        );
        assert_eq!(
            AspectKind::EsrCertificateStateStatistic.role(),
            AspectRole::Certificate
        );
    }

    #[test]
    fn aliases_resolve_to_canonical_name() {
        let kind = AspectKind::from_name("SerialPartTypization").unwrap();
        assert_eq!(kind.as_str(), "SerialPart");
    }
}
