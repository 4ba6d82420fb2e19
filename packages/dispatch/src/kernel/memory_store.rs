//! In-process implementation of every store trait.
//!
//! Backs tests and the CLI when no `DATABASE_URL` is configured. Distances are
//! computed with the Haversine formula, so results line up with the Postgres
//! adapter's `haversine_distance_m` function.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{
    BaseDispatchStore, BaseDonorDirectory, BaseDonorRegistry, BaseGeoIndex, BaseMatchLedger,
    BaseRequestStore, StoreResult,
};
use crate::common::utils::Position;
use crate::common::{DispatchId, DonorId, RequestId, StoreError};
use crate::domains::blood::models::{
    BloodGroup, BloodRequest, DispatchRound, Donor, DonorDistance, RequestState, RhesusFactor,
    Tier,
};

type TierLedger = BTreeMap<Tier, BTreeMap<DonorId, f64>>;

#[derive(Default)]
struct State {
    donors: BTreeMap<DonorId, Donor>,
    groups: HashMap<BloodGroup, HashSet<DonorId>>,
    rhesus: HashMap<RhesusFactor, HashSet<DonorId>>,
    requests: HashMap<RequestId, BloodRequest>,
    ledger: HashMap<RequestId, TierLedger>,
    rounds: HashMap<DispatchId, DispatchRound>,
}

impl State {
    fn unfacet(&mut self, donor: &Donor) {
        if let Some(members) = self.groups.get_mut(&donor.blood_group) {
            members.remove(&donor.id);
        }
        if let Some(rhesus) = donor.rhesus_factor {
            if let Some(members) = self.rhesus.get_mut(&rhesus) {
                members.remove(&donor.id);
            }
        }
    }

    fn facet(&mut self, donor: &Donor) {
        self.groups
            .entry(donor.blood_group)
            .or_default()
            .insert(donor.id.clone());
        if let Some(rhesus) = donor.rhesus_factor {
            self.rhesus.entry(rhesus).or_default().insert(donor.id.clone());
        }
    }
}

/// `RwLock`-guarded in-memory store with optional fault and latency injection.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    failures_pending: AtomicU32,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` engine-facing calls fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Delays every engine-facing call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Total number of ledger entries for a request, across tiers.
    pub async fn ledger_size(&self, request_id: RequestId) -> usize {
        self.state
            .read()
            .await
            .ledger
            .get(&request_id)
            .map_or(0, |tiers| tiers.values().map(BTreeMap::len).sum())
    }

    /// Number of stored requests, whatever their state.
    pub async fn request_count(&self) -> usize {
        self.state.read().await.requests.len()
    }

    /// Snapshot of a request's whole ledger, keyed by tier.
    pub async fn ledger_snapshot(&self, request_id: RequestId) -> TierLedger {
        self.state
            .read()
            .await
            .ledger
            .get(&request_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn enter(&self, operation: &'static str) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!(operation, "Injected store failure");
            return Err(StoreError::Unavailable(format!(
                "injected failure during {}",
                operation
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl BaseGeoIndex for MemoryStore {
    async fn within_radius(
        &self,
        center: Position,
        radius_m: f64,
    ) -> StoreResult<Vec<DonorDistance>> {
        self.enter("within_radius").await?;
        let state = self.state.read().await;

        let mut neighbours: Vec<DonorDistance> = state
            .donors
            .values()
            .filter_map(|donor| {
                let distance = center.distance_to(donor.position.as_ref()?);
                (distance <= radius_m).then(|| DonorDistance::new(donor.id.clone(), distance))
            })
            .collect();

        // Stable: equal distances keep donor-ID order.
        neighbours.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(neighbours)
    }
}

#[async_trait]
impl BaseDonorRegistry for MemoryStore {
    async fn members_of_group(&self, group: BloodGroup) -> StoreResult<HashSet<DonorId>> {
        self.enter("members_of_group").await?;
        let state = self.state.read().await;
        Ok(state.groups.get(&group).cloned().unwrap_or_default())
    }

    async fn members_of_rhesus(&self, rhesus: RhesusFactor) -> StoreResult<HashSet<DonorId>> {
        self.enter("members_of_rhesus").await?;
        let state = self.state.read().await;
        Ok(state.rhesus.get(&rhesus).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl BaseMatchLedger for MemoryStore {
    async fn matched_donors(&self, request_id: RequestId) -> StoreResult<HashSet<DonorId>> {
        self.enter("matched_donors").await?;
        let state = self.state.read().await;
        Ok(state
            .ledger
            .get(&request_id)
            .map(|tiers| tiers.values().flat_map(|d| d.keys().cloned()).collect())
            .unwrap_or_default())
    }

    async fn merge(
        &self,
        request_id: RequestId,
        tier: Tier,
        matches: &[DonorDistance],
    ) -> StoreResult<()> {
        self.enter("merge").await?;
        let mut state = self.state.write().await;
        let tiers = state.ledger.entry(request_id).or_default();

        let already: HashSet<DonorId> = tiers.values().flat_map(|d| d.keys().cloned()).collect();
        let entry = tiers.entry(tier).or_default();
        for m in matches {
            if !already.contains(&m.donor_id) {
                entry.entry(m.donor_id.clone()).or_insert(m.distance_m);
            }
        }
        Ok(())
    }

    async fn read(
        &self,
        request_id: RequestId,
        tier: Tier,
    ) -> StoreResult<BTreeMap<DonorId, f64>> {
        self.enter("read").await?;
        let state = self.state.read().await;
        Ok(state
            .ledger
            .get(&request_id)
            .and_then(|tiers| tiers.get(&tier))
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, request_id: RequestId) -> StoreResult<()> {
        self.enter("clear").await?;
        self.state.write().await.ledger.remove(&request_id);
        Ok(())
    }
}

#[async_trait]
impl BaseRequestStore for MemoryStore {
    async fn insert_request(&self, request: &BloodRequest) -> StoreResult<()> {
        self.enter("insert_request").await?;
        self.state
            .write()
            .await
            .requests
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn find_request(&self, id: RequestId) -> StoreResult<Option<BloodRequest>> {
        self.enter("find_request").await?;
        Ok(self.state.read().await.requests.get(&id).cloned())
    }

    async fn mark_inactive(&self, id: RequestId) -> StoreResult<bool> {
        self.enter("mark_inactive").await?;
        let mut state = self.state.write().await;
        match state.requests.get_mut(&id) {
            Some(request) if request.is_active() => {
                request.state = RequestState::Inactive;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_request(&self, id: RequestId) -> StoreResult<()> {
        self.enter("delete_request").await?;
        let mut state = self.state.write().await;
        state.requests.remove(&id);
        state.ledger.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BaseDispatchStore for MemoryStore {
    async fn insert_round(&self, round: &DispatchRound) -> StoreResult<bool> {
        self.enter("insert_round").await?;
        let mut state = self.state.write().await;
        if state.rounds.contains_key(&round.id) {
            return Ok(false);
        }
        state.rounds.insert(round.id, round.clone());
        Ok(true)
    }

    async fn find_round(&self, id: DispatchId) -> StoreResult<Option<DispatchRound>> {
        self.enter("find_round").await?;
        Ok(self.state.read().await.rounds.get(&id).cloned())
    }
}

// Registration is the collaborator's write path; it bypasses fault injection
// so fixtures can always be seeded.
#[async_trait]
impl BaseDonorDirectory for MemoryStore {
    async fn upsert_donor(&self, donor: &Donor) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(previous) = state.donors.remove(&donor.id) {
            state.unfacet(&previous);
        }
        state.facet(donor);
        state.donors.insert(donor.id.clone(), donor.clone());
        Ok(())
    }

    async fn find_donor(&self, id: &DonorId) -> StoreResult<Option<Donor>> {
        Ok(self.state.read().await.donors.get(id).cloned())
    }

    async fn remove_donor(&self, id: &DonorId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.donors.remove(id) {
            Some(previous) => {
                state.unfacet(&previous);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
