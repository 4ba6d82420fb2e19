//! The dispatch round: one pass over a request's compatibility cascade.
//!
//! Steps, per round:
//! 1. Snapshot the neighbourhood around the dispatch position once.
//! 2. Walk the request's tiers in priority order. Before each tier, stop if
//!    the request's cap is already met; lower tiers are then never queried.
//! 3. Resolve the tier to `neighbourhood ∩ group [∩ rhesus]` in distance
//!    order, drop donors already ledgered and the requester, keep the
//!    closest `remaining_capacity` of them.
//! 4. Merge the survivors into the ledger under the tier and keep them as the
//!    tier's contribution to this round.
//! 5. Assemble the round from the contributions, pruning empty tiers.
//!
//! A round is not atomic. Merged tiers stand if a later step fails; a retry
//! or the next round sees them as already matched and carries on.

use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::common::utils::Position;
use crate::common::{DispatchId, StoreError};
use crate::config::DispatchSettings;
use crate::domains::blood::compatibility::CompatibilityPlan;
use crate::domains::blood::geo_index::GeoIndex;
use crate::domains::blood::ledger::RequestMatchLedger;
use crate::domains::blood::models::{BloodRequest, DispatchRound, DonorDistance};
use crate::domains::blood::registry::DonorRegistry;
use crate::kernel::{BaseDonorRegistry, BaseGeoIndex, BaseMatchLedger, DispatchDeps};

/// Runs dispatch rounds against explicitly injected collaborators.
///
/// Callers must hold the request's lock for the whole of [`Self::execute`].
pub struct DispatchExecutor<'a> {
    geo_index: &'a dyn BaseGeoIndex,
    registry: &'a dyn BaseDonorRegistry,
    ledger: &'a dyn BaseMatchLedger,
    radius_m: f64,
    max_matches: usize,
    timeout: Duration,
}

impl<'a> DispatchExecutor<'a> {
    pub fn new(
        geo_index: &'a dyn BaseGeoIndex,
        registry: &'a dyn BaseDonorRegistry,
        ledger: &'a dyn BaseMatchLedger,
        settings: &DispatchSettings,
    ) -> Self {
        Self {
            geo_index,
            registry,
            ledger,
            radius_m: settings.radius_m,
            max_matches: settings.max_matches,
            timeout: settings.store_timeout,
        }
    }

    pub fn from_deps(deps: &'a DispatchDeps) -> Self {
        Self::new(
            deps.geo_index.as_ref(),
            deps.registry.as_ref(),
            deps.ledger.as_ref(),
            &deps.settings,
        )
    }

    #[instrument(
        skip(self, request, dispatch_id),
        fields(
            request_id = %request.id,
            dispatch_id = %dispatch_id,
            blood_type = %format!("{}{}", request.blood_group, request.rhesus_factor)
        )
    )]
    pub async fn execute(
        &self,
        request: &BloodRequest,
        center: Position,
        dispatch_id: DispatchId,
    ) -> Result<DispatchRound, StoreError> {
        let radius_m = request.radius_or(self.radius_m);
        let neighbourhood = GeoIndex::new(self.geo_index, self.timeout)
            .neighbourhood(center, radius_m)
            .await?;

        let registry = DonorRegistry::new(self.registry, self.timeout);
        let mut ledger =
            RequestMatchLedger::load(self.ledger, request.id, self.max_matches, self.timeout)
                .await?;

        let tiers = CompatibilityPlan::tiers_for(request.blood_group, request.rhesus_factor);
        let mut contributions = Vec::with_capacity(tiers.len());

        for &tier in tiers {
            let remaining = ledger.remaining_capacity();
            if remaining == 0 {
                debug!(tier = %tier, "Capacity reached, skipping remaining tiers");
                break;
            }

            let members = registry.members_for(tier).await?;
            let already = ledger.already_matched();
            let candidates: Vec<DonorDistance> = neighbourhood
                .intersect(&members.group, members.rhesus.as_ref())
                .filter(|d| d.donor_id != request.requester_id && !already.contains(&d.donor_id))
                .take(remaining)
                .cloned()
                .collect();

            debug!(tier = %tier, matched = candidates.len(), remaining, "Tier searched");

            ledger.merge(tier, &candidates).await?;
            contributions.push((tier, candidates));
        }

        let round = DispatchRound::assemble(dispatch_id, request.id, contributions);

        info!(
            matched = round.outcome_size(),
            neighbourhood = neighbourhood.len(),
            ledger_total = ledger.already_matched().len(),
            "Dispatch round complete"
        );

        Ok(round)
    }
}
