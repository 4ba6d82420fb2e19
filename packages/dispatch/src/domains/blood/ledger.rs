//! Per-request view over the match ledger.
//!
//! Loaded once at round start. The round holds the request lock, so merges
//! made during the round are tracked locally instead of re-reading the store
//! before every tier.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::common::{DonorId, RequestId, StoreError};
use crate::domains::blood::models::{DonorDistance, Tier};
use crate::kernel::{with_timeout, BaseMatchLedger};

pub struct RequestMatchLedger<'a> {
    ledger: &'a dyn BaseMatchLedger,
    request_id: RequestId,
    max_matches: usize,
    timeout: Duration,
    matched: HashSet<DonorId>,
}

impl<'a> RequestMatchLedger<'a> {
    pub async fn load(
        ledger: &'a dyn BaseMatchLedger,
        request_id: RequestId,
        max_matches: usize,
        timeout: Duration,
    ) -> Result<RequestMatchLedger<'a>, StoreError> {
        let matched = with_timeout("matched_donors", timeout, ledger.matched_donors(request_id)).await?;
        debug!(request_id = %request_id, matched = matched.len(), "Ledger loaded");

        Ok(Self {
            ledger,
            request_id,
            max_matches,
            timeout,
            matched,
        })
    }

    /// Every donor ever ledgered for the request, whatever the tier.
    pub fn already_matched(&self) -> &HashSet<DonorId> {
        &self.matched
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_matches.saturating_sub(self.matched.len())
    }

    /// Records `matches` under `tier`. Callers pass only donors absent from
    /// [`Self::already_matched`].
    pub async fn merge(&mut self, tier: Tier, matches: &[DonorDistance]) -> Result<(), StoreError> {
        if matches.is_empty() {
            return Ok(());
        }

        with_timeout(
            "merge",
            self.timeout,
            self.ledger.merge(self.request_id, tier, matches),
        )
        .await?;

        self.matched
            .extend(matches.iter().map(|m| m.donor_id.clone()));
        Ok(())
    }

    pub async fn read(&self, tier: Tier) -> Result<BTreeMap<DonorId, f64>, StoreError> {
        with_timeout("read", self.timeout, self.ledger.read(self.request_id, tier)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::blood::models::{BloodGroup, RhesusFactor};
    use crate::kernel::MemoryStore;

    #[tokio::test]
    async fn test_capacity_tracks_merges_across_loads() {
        let store = MemoryStore::new();
        let request_id = RequestId::new();
        let tier = Tier::exact(BloodGroup::B, RhesusFactor::Negative);
        let timeout = Duration::from_secs(1);

        let mut ledger = RequestMatchLedger::load(&store, request_id, 3, timeout)
            .await
            .unwrap();
        assert_eq!(ledger.remaining_capacity(), 3);

        ledger
            .merge(
                tier,
                &[DonorDistance::new("d1", 5.0), DonorDistance::new("d2", 7.5)],
            )
            .await
            .unwrap();
        assert_eq!(ledger.remaining_capacity(), 1);
        assert!(ledger.already_matched().contains(&DonorId::from("d2")));

        let reloaded = RequestMatchLedger::load(&store, request_id, 3, timeout)
            .await
            .unwrap();
        assert_eq!(reloaded.remaining_capacity(), 1);
        assert_eq!(reloaded.read(tier).await.unwrap().get(&DonorId::from("d1")), Some(&5.0));
    }

    #[tokio::test]
    async fn test_capacity_never_underflows() {
        let store = MemoryStore::new();
        let request_id = RequestId::new();
        let tier = Tier::any(BloodGroup::O);
        store
            .merge(
                request_id,
                tier,
                &[DonorDistance::new("d1", 1.0), DonorDistance::new("d2", 2.0)],
            )
            .await
            .unwrap();

        // Cap lowered below what is already ledgered.
        let ledger = RequestMatchLedger::load(&store, request_id, 1, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(ledger.remaining_capacity(), 0);
    }
}
