use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BloodGroup, RhesusFactor};
use crate::common::{DonorId, RequestId};

/// Lifecycle of a blood request. `Inactive` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Active,
    Inactive,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for RequestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown request state '{}'", other)),
        }
    }
}

/// An urgent request for blood of a given group and rhesus factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequest {
    pub id: RequestId,
    /// The requester's own donor/user ID; never matched against its own request.
    pub requester_id: DonorId,
    pub blood_group: BloodGroup,
    pub rhesus_factor: RhesusFactor,
    pub state: RequestState,
    /// Neighbourhood radius override; the configured default applies when unset.
    pub radius_m: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl BloodRequest {
    pub fn new(
        requester_id: impl Into<DonorId>,
        blood_group: BloodGroup,
        rhesus_factor: RhesusFactor,
    ) -> Self {
        Self {
            id: RequestId::new(),
            requester_id: requester_id.into(),
            blood_group,
            rhesus_factor,
            state: RequestState::Active,
            radius_m: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = Some(radius_m);
        self
    }

    pub fn is_active(&self) -> bool {
        self.state == RequestState::Active
    }

    pub fn radius_or(&self, default_m: f64) -> f64 {
        self.radius_m.unwrap_or(default_m)
    }
}
