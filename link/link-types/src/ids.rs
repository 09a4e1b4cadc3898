//! Stable identifiers for parts and vessels.
//!
//! Both identifiers survive save/load: a persisted link refers to its
//! counterpart by [`PartId`], never by an in-memory handle.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Persistent identifier of a part (a body that can own link peers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartId(pub u64);

impl PartId {
    /// Create a new part ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for PartId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Part({})", self.0)
    }
}

/// Identifier of a vessel: the grouping whose physics activation mode
/// (on-rails / off-rails) is switched as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VesselId(pub u64);

impl VesselId {
    /// Create a new vessel ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for VesselId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for VesselId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Vessel({})", self.0)
    }
}
