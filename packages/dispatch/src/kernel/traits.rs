// Trait definitions for the dispatch engine's supporting store
//
// These are INFRASTRUCTURE traits only - no matching logic. The cascade,
// diffing and capping live in domains/blood; these only answer queries and
// persist records.
//
// Naming convention: Base* for trait names (e.g., BaseGeoIndex, BaseMatchLedger)

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use crate::common::utils::Position;
use crate::common::{DispatchId, DonorId, RequestId, StoreError};
use crate::domains::blood::models::{
    BloodGroup, BloodRequest, DispatchRound, Donor, DonorDistance, RhesusFactor, Tier,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// =============================================================================
// Geo index (donor positions)
// =============================================================================

#[async_trait]
pub trait BaseGeoIndex: Send + Sync {
    /// Donors positioned within `radius_m` of `center`, ascending by distance.
    async fn within_radius(&self, center: Position, radius_m: f64)
        -> StoreResult<Vec<DonorDistance>>;
}

// =============================================================================
// Donor registry (group / rhesus membership)
// =============================================================================

#[async_trait]
pub trait BaseDonorRegistry: Send + Sync {
    async fn members_of_group(&self, group: BloodGroup) -> StoreResult<HashSet<DonorId>>;

    /// Donors whose rhesus factor is recorded as `rhesus`.
    async fn members_of_rhesus(&self, rhesus: RhesusFactor) -> StoreResult<HashSet<DonorId>>;
}

// =============================================================================
// Match ledger (per request, per tier, across rounds)
// =============================================================================

#[async_trait]
pub trait BaseMatchLedger: Send + Sync {
    /// Union of every donor ledgered for the request, whatever the tier.
    async fn matched_donors(&self, request_id: RequestId) -> StoreResult<HashSet<DonorId>>;

    /// Adds matches under `tier`. A donor already ledgered for the request
    /// (under any tier) is left untouched, so replaying a merge is harmless.
    async fn merge(
        &self,
        request_id: RequestId,
        tier: Tier,
        matches: &[DonorDistance],
    ) -> StoreResult<()>;

    async fn read(&self, request_id: RequestId, tier: Tier)
        -> StoreResult<BTreeMap<DonorId, f64>>;

    /// Drops every ledger entry of the request.
    async fn clear(&self, request_id: RequestId) -> StoreResult<()>;
}

// =============================================================================
// Durable records (requests, rounds, donors)
// =============================================================================

#[async_trait]
pub trait BaseRequestStore: Send + Sync {
    async fn insert_request(&self, request: &BloodRequest) -> StoreResult<()>;

    async fn find_request(&self, id: RequestId) -> StoreResult<Option<BloodRequest>>;

    /// Flips an active request to inactive. Returns `false` when the request
    /// is missing or already inactive.
    async fn mark_inactive(&self, id: RequestId) -> StoreResult<bool>;

    async fn delete_request(&self, id: RequestId) -> StoreResult<()>;
}

#[async_trait]
pub trait BaseDispatchStore: Send + Sync {
    /// Stores a round. Returns `false` when a round with the same ID exists.
    async fn insert_round(&self, round: &DispatchRound) -> StoreResult<bool>;

    async fn find_round(&self, id: DispatchId) -> StoreResult<Option<DispatchRound>>;
}

/// Donor registration write path; keeps the geo index and registry facets in
/// step with the donor record.
#[async_trait]
pub trait BaseDonorDirectory: Send + Sync {
    async fn upsert_donor(&self, donor: &Donor) -> StoreResult<()>;

    async fn find_donor(&self, id: &DonorId) -> StoreResult<Option<Donor>>;

    /// Returns `false` when no such donor was registered.
    async fn remove_donor(&self, id: &DonorId) -> StoreResult<bool>;
}
