//! Identifier newtypes shared by the engine and the CLI.
//!
//! Kept in the types crate so summaries, plans and published results all
//! speak about the same twin and owner identifiers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Global asset id of a part (`catenaXId`), stable across all of its aspects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatenaXId(String);

impl CatenaXId {
    /// Create a new global asset id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CatenaXId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for CatenaXId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

/// Business partner number of the owning organization (e.g. `"BPNL00000003AYRE"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bpn(String);

impl Bpn {
    /// Create a new business partner number.
    #[must_use]
    pub fn new(bpn: impl Into<String>) -> Self {
        Self(bpn.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Bpn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for Bpn {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}
