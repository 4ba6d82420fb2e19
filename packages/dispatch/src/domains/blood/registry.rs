use std::collections::HashSet;
use std::time::Duration;

use crate::common::{DonorId, StoreError};
use crate::domains::blood::models::Tier;
use crate::kernel::{with_timeout, BaseDonorRegistry};

/// Group and rhesus membership a tier resolves against.
pub struct TierMembers {
    pub group: HashSet<DonorId>,
    /// `None` for `*` tiers, which do not constrain rhesus.
    pub rhesus: Option<HashSet<DonorId>>,
}

/// Bounded view over the donor registry.
pub struct DonorRegistry<'a> {
    registry: &'a dyn BaseDonorRegistry,
    timeout: Duration,
}

impl<'a> DonorRegistry<'a> {
    pub fn new(registry: &'a dyn BaseDonorRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub async fn members_for(&self, tier: Tier) -> Result<TierMembers, StoreError> {
        let group = with_timeout(
            "members_of_group",
            self.timeout,
            self.registry.members_of_group(tier.group),
        )
        .await?;

        let rhesus = match tier.rhesus.factor() {
            Some(factor) => Some(
                with_timeout(
                    "members_of_rhesus",
                    self.timeout,
                    self.registry.members_of_rhesus(factor),
                )
                .await?,
            ),
            None => None,
        };

        Ok(TierMembers { group, rhesus })
    }
}
