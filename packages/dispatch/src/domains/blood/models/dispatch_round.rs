use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{BloodGroup, DonorDistance, Tier, TierRhesus};
use crate::common::{DispatchId, DonorId, RequestId};

/// Donors surfaced by one round, grouped `group -> rhesus-or-any -> donor -> meters`.
///
/// Never holds an empty branch: tiers without donors are not inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(BTreeMap<BloodGroup, BTreeMap<TierRhesus, BTreeMap<DonorId, f64>>>);

impl Outcome {
    /// Records a tier's contribution; an empty contribution leaves no trace.
    pub fn insert_tier(&mut self, tier: Tier, matches: impl IntoIterator<Item = DonorDistance>) {
        let donors: BTreeMap<DonorId, f64> = matches
            .into_iter()
            .map(|m| (m.donor_id, m.distance_m))
            .collect();

        if donors.is_empty() {
            return;
        }

        self.0
            .entry(tier.group)
            .or_default()
            .entry(tier.rhesus)
            .or_default()
            .extend(donors);
    }

    pub fn tier(&self, tier: &Tier) -> Option<&BTreeMap<DonorId, f64>> {
        self.0.get(&tier.group)?.get(&tier.rhesus)
    }

    /// Tiers present in this outcome, in key order.
    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.0.iter().flat_map(|(group, by_rhesus)| {
            by_rhesus.keys().map(move |rhesus| Tier {
                group: *group,
                rhesus: *rhesus,
            })
        })
    }

    pub fn contains(&self, donor_id: &DonorId) -> bool {
        self.0
            .values()
            .flat_map(|by_rhesus| by_rhesus.values())
            .any(|donors| donors.contains_key(donor_id))
    }

    /// Total number of donors across every tier.
    pub fn size(&self) -> usize {
        self.0
            .values()
            .flat_map(|by_rhesus| by_rhesus.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable record of one dispatch round.
///
/// Serializes as `{ id, requestId, createdAt, outcome }`, with `outcome: null`
/// when the round surfaced nobody.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRound {
    pub id: DispatchId,
    pub request_id: RequestId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub outcome: Option<Outcome>,
}

impl DispatchRound {
    /// Builds a round from per-tier contributions, pruning empty tiers and
    /// collapsing an entirely empty outcome to `None`.
    pub fn assemble(
        id: DispatchId,
        request_id: RequestId,
        contributions: impl IntoIterator<Item = (Tier, Vec<DonorDistance>)>,
    ) -> Self {
        let mut outcome = Outcome::default();
        for (tier, matches) in contributions {
            outcome.insert_tier(tier, matches);
        }

        Self {
            id,
            request_id,
            created_at: Utc::now(),
            outcome: (!outcome.is_empty()).then_some(outcome),
        }
    }

    pub fn outcome_size(&self) -> usize {
        self.outcome.as_ref().map_or(0, Outcome::size)
    }
}
