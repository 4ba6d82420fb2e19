//! In-memory fixtures for dispatch tests.
//!
//! Donors are placed due north of `ORIGIN` at exact distances, so expected
//! outcomes can be written in meters.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dispatch_core::common::utils::geo::north_of;
use dispatch_core::common::utils::Position;
use dispatch_core::common::{DispatchId, DonorId, RequestId, StoreError};
use dispatch_core::config::DispatchSettings;
use dispatch_core::domains::blood::models::{
    BloodGroup, BloodRequest, DispatchRound, Donor, DonorDistance, RhesusFactor, Tier,
};
use dispatch_core::kernel::{
    BaseDispatchStore, BaseDonorDirectory, BaseDonorRegistry, BaseMatchLedger, BaseRequestStore,
    DispatchDeps, MemoryStore, RetryPolicy, StoreResult,
};

/// Dispatch position used by every scenario (Douala).
pub const ORIGIN: Position = Position {
    longitude: 9.7679,
    latitude: 4.0511,
};

/// Default settings with a fast retry loop.
pub fn test_settings() -> DispatchSettings {
    DispatchSettings {
        retry: RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(1),
        },
        ..DispatchSettings::default()
    }
}

pub struct MemoryHarness {
    pub store: Arc<MemoryStore>,
    pub deps: DispatchDeps,
}

impl MemoryHarness {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: DispatchSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let deps = DispatchDeps::in_memory(store.clone(), settings);
        Self { store, deps }
    }

    /// Registers a donor `meters` north of `ORIGIN`.
    pub async fn donor(
        &self,
        id: &str,
        group: BloodGroup,
        rhesus: Option<RhesusFactor>,
        meters: f64,
    ) -> DonorId {
        let donor = Donor::new(id, group, rhesus).at(north_of(&ORIGIN, meters));
        self.store.upsert_donor(&donor).await.unwrap();
        donor.id
    }

    /// Stores an active request without running any round.
    pub async fn request(
        &self,
        requester: &str,
        group: BloodGroup,
        rhesus: RhesusFactor,
    ) -> BloodRequest {
        let request = BloodRequest::new(requester, group, rhesus);
        self.store.insert_request(&request).await.unwrap();
        request
    }
}

// =============================================================================
// Registry wrappers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryQuery {
    Group(BloodGroup),
    Rhesus(RhesusFactor),
}

/// Registry that remembers every membership query it answers.
pub struct RecordingRegistry {
    inner: Arc<MemoryStore>,
    queries: Mutex<Vec<RegistryQuery>>,
}

impl RecordingRegistry {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn clear(&self) {
        self.queries.lock().unwrap().clear();
    }

    /// Tiers searched so far, rendered like `"O+"` or `"AB*"`.
    ///
    /// A group query followed by a rhesus query is one exact tier; a group
    /// query on its own is an any-rhesus tier.
    pub fn tiers_queried(&self) -> Vec<String> {
        let queries = self.queries.lock().unwrap();
        let mut tiers = Vec::new();
        let mut iter = queries.iter().peekable();

        while let Some(query) = iter.next() {
            if let RegistryQuery::Group(group) = query {
                match iter.peek() {
                    Some(RegistryQuery::Rhesus(rhesus)) => {
                        tiers.push(format!("{}{}", group, rhesus));
                        iter.next();
                    }
                    _ => tiers.push(format!("{}*", group)),
                }
            }
        }

        tiers
    }
}

#[async_trait]
impl BaseDonorRegistry for RecordingRegistry {
    async fn members_of_group(&self, group: BloodGroup) -> StoreResult<HashSet<DonorId>> {
        self.queries.lock().unwrap().push(RegistryQuery::Group(group));
        self.inner.members_of_group(group).await
    }

    async fn members_of_rhesus(&self, rhesus: RhesusFactor) -> StoreResult<HashSet<DonorId>> {
        self.queries.lock().unwrap().push(RegistryQuery::Rhesus(rhesus));
        self.inner.members_of_rhesus(rhesus).await
    }
}

/// Registry whose every query fails as if the store were down.
pub struct UnavailableRegistry;

#[async_trait]
impl BaseDonorRegistry for UnavailableRegistry {
    async fn members_of_group(&self, _group: BloodGroup) -> StoreResult<HashSet<DonorId>> {
        Err(StoreError::Unavailable("registry offline".into()))
    }

    async fn members_of_rhesus(&self, _rhesus: RhesusFactor) -> StoreResult<HashSet<DonorId>> {
        Err(StoreError::Unavailable("registry offline".into()))
    }
}

/// Registry whose group queries for one blood group fail a set number of
/// times before answering normally.
pub struct FlakyRegistry {
    inner: Arc<MemoryStore>,
    group: BloodGroup,
    failures: AtomicU32,
}

impl FlakyRegistry {
    pub fn new(inner: Arc<MemoryStore>, group: BloodGroup, failures: u32) -> Self {
        Self {
            inner,
            group,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl BaseDonorRegistry for FlakyRegistry {
    async fn members_of_group(&self, group: BloodGroup) -> StoreResult<HashSet<DonorId>> {
        if group == self.group && take_failure(&self.failures) {
            return Err(StoreError::Unavailable(format!("group {} lookup dropped", group)));
        }
        self.inner.members_of_group(group).await
    }

    async fn members_of_rhesus(&self, rhesus: RhesusFactor) -> StoreResult<HashSet<DonorId>> {
        self.inner.members_of_rhesus(rhesus).await
    }
}

/// Takes one failure off `budget`, returning whether one was left.
fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// =============================================================================
// Store wrappers
// =============================================================================

/// Ledger whose `clear` fails a set number of times before going through.
pub struct FlakyClearLedger {
    inner: Arc<MemoryStore>,
    failures: AtomicU32,
}

impl FlakyClearLedger {
    pub fn new(inner: Arc<MemoryStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl BaseMatchLedger for FlakyClearLedger {
    async fn matched_donors(&self, request_id: RequestId) -> StoreResult<HashSet<DonorId>> {
        self.inner.matched_donors(request_id).await
    }

    async fn merge(
        &self,
        request_id: RequestId,
        tier: Tier,
        matches: &[DonorDistance],
    ) -> StoreResult<()> {
        self.inner.merge(request_id, tier, matches).await
    }

    async fn read(&self, request_id: RequestId, tier: Tier) -> StoreResult<BTreeMap<DonorId, f64>> {
        self.inner.read(request_id, tier).await
    }

    async fn clear(&self, request_id: RequestId) -> StoreResult<()> {
        if take_failure(&self.failures) {
            return Err(StoreError::Unavailable("ledger clear dropped".into()));
        }
        self.inner.clear(request_id).await
    }
}

/// Dispatch store that records a round and then loses the reply, a set
/// number of times.
pub struct LostReplyDispatches {
    inner: Arc<MemoryStore>,
    failures: AtomicU32,
}

impl LostReplyDispatches {
    pub fn new(inner: Arc<MemoryStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl BaseDispatchStore for LostReplyDispatches {
    async fn insert_round(&self, round: &DispatchRound) -> StoreResult<bool> {
        let inserted = self.inner.insert_round(round).await?;
        if take_failure(&self.failures) {
            return Err(StoreError::Unavailable("insert reply lost".into()));
        }
        Ok(inserted)
    }

    async fn find_round(&self, id: DispatchId) -> StoreResult<Option<DispatchRound>> {
        self.inner.find_round(id).await
    }
}
