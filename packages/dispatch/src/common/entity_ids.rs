//! Typed ID definitions for the dispatch entities.
//!
//! Requests and dispatch rounds are identified by generated UUIDs. Donors are
//! identified by whatever opaque user identifier the identity provider hands
//! out, so `DonorId` wraps a string instead.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for blood donation requests.
pub struct BloodRequest;

/// Marker type for dispatch rounds.
pub struct DispatchRound;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for blood donation requests.
pub type RequestId = Id<BloodRequest>;

/// Typed ID for a single dispatch round.
pub type DispatchId = Id<DispatchRound>;

/// Opaque donor identity (the donor's user ID).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct DonorId(String);

impl DonorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DonorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DonorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DonorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
