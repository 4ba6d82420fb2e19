//! Neighbourhood snapshots over the donor geo index.

use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, trace};

use crate::common::utils::Position;
use crate::common::{DonorId, StoreError};
use crate::domains::blood::models::DonorDistance;
use crate::kernel::{with_timeout, BaseGeoIndex};

pub struct GeoIndex<'a> {
    index: &'a dyn BaseGeoIndex,
    timeout: Duration,
}

impl<'a> GeoIndex<'a> {
    pub fn new(index: &'a dyn BaseGeoIndex, timeout: Duration) -> Self {
        Self { index, timeout }
    }

    /// Loads every positioned donor within `radius_m` of `center`, nearest
    /// first, as one frozen snapshot.
    pub async fn neighbourhood(
        &self,
        center: Position,
        radius_m: f64,
    ) -> Result<Neighbourhood, StoreError> {
        let donors = with_timeout(
            "within_radius",
            self.timeout,
            self.index.within_radius(center, radius_m),
        )
        .await?;

        debug!(count = donors.len(), radius_m, "Neighbourhood snapshot taken");
        Ok(Neighbourhood { donors })
    }
}

/// Round-scoped snapshot of the donors around a dispatch position.
///
/// Every tier of a round intersects against the same snapshot, so position
/// updates landing mid-round are only seen by the next round. Released when
/// dropped, whichever way the round ends.
#[derive(Debug)]
pub struct Neighbourhood {
    donors: Vec<DonorDistance>,
}

impl Neighbourhood {
    pub fn len(&self) -> usize {
        self.donors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.donors.is_empty()
    }

    /// Donors in the snapshot that belong to `group` (and `rhesus`, when the
    /// tier constrains it), in ascending distance order.
    pub fn intersect<'s>(
        &'s self,
        group: &'s HashSet<DonorId>,
        rhesus: Option<&'s HashSet<DonorId>>,
    ) -> impl Iterator<Item = &'s DonorDistance> + 's {
        self.donors.iter().filter(move |d| {
            group.contains(&d.donor_id) && rhesus.map_or(true, |r| r.contains(&d.donor_id))
        })
    }
}

impl Drop for Neighbourhood {
    fn drop(&mut self) {
        trace!(count = self.donors.len(), "Neighbourhood snapshot released");
    }
}
