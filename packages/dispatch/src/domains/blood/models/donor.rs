use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BloodGroup, RhesusFactor};
use crate::common::utils::Position;
use crate::common::DonorId;

/// A registered blood donor.
///
/// Only the group/rhesus facets and the last known position take part in
/// matching; a donor without a position is never part of a neighbourhood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    pub id: DonorId,
    pub blood_group: BloodGroup,
    pub rhesus_factor: Option<RhesusFactor>,
    pub position: Option<Position>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Donor {
    pub fn new(id: impl Into<DonorId>, blood_group: BloodGroup, rhesus_factor: Option<RhesusFactor>) -> Self {
        Self {
            id: id.into(),
            blood_group,
            rhesus_factor,
            position: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

/// A donor found by a neighbourhood query, with its distance to the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorDistance {
    pub donor_id: DonorId,
    pub distance_m: f64,
}

impl DonorDistance {
    pub fn new(donor_id: impl Into<DonorId>, distance_m: f64) -> Self {
        Self {
            donor_id: donor_id.into(),
            distance_m,
        }
    }
}
