//! Shared twinseed model types.
//!
//! Twins, descriptors, semantic-type classification, provider targets and
//! publish results. Free of I/O so the engine and CLI can both depend on it.

pub mod ident;
pub mod publish;
pub mod semantic;
pub mod target;
pub mod twin;

pub use ident::{Bpn, CatenaXId};
pub use publish::{ArtifactKind, PublishOutcome, PublishResult};
pub use semantic::{AspectKind, AspectRole, KeyClass};
pub use target::ProvisioningTarget;
pub use twin::{DigitalTwin, SpecificAssetId, SubmodelDescriptor};
