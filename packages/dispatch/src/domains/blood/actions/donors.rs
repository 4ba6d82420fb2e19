//! Donor registration actions
//!
//! Writes go straight to the donor directory, which keeps group/rhesus
//! membership and positions in step. Rounds already in flight keep their
//! neighbourhood snapshot; the change is visible from the next round on.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::dispatch::validate_position;
use crate::common::utils::Position;
use crate::common::{DispatchError, DonorId};
use crate::domains::blood::models::{BloodGroup, Donor, RhesusFactor};
use crate::kernel::{with_timeout, DispatchDeps};

/// Input for registering a donor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDonor {
    pub id: DonorId,
    pub blood_group: BloodGroup,
    pub rhesus_factor: Option<RhesusFactor>,
    pub position: Option<Position>,
}

/// Partial donor update; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDonor {
    pub blood_group: Option<BloodGroup>,
    pub rhesus_factor: Option<RhesusFactor>,
    pub position: Option<Position>,
}

/// Registers a donor, replacing any previous registration with the same ID.
#[instrument(skip(input, deps), fields(donor_id = %input.id))]
pub async fn register_donor(input: RegisterDonor, deps: &DispatchDeps) -> Result<Donor, DispatchError> {
    let position = input.position.map(validate_position).transpose()?;

    let mut donor = Donor::new(input.id, input.blood_group, input.rhesus_factor);
    donor.position = position;

    with_timeout(
        "upsert_donor",
        deps.settings.store_timeout,
        deps.donors.upsert_donor(&donor),
    )
    .await?;

    info!(blood_group = %donor.blood_group, positioned = donor.position.is_some(), "Donor registered");
    Ok(donor)
}

#[instrument(skip(update, deps))]
pub async fn update_donor(
    donor_id: DonorId,
    update: UpdateDonor,
    deps: &DispatchDeps,
) -> Result<Donor, DispatchError> {
    let timeout = deps.settings.store_timeout;
    let position = update.position.map(validate_position).transpose()?;

    let mut donor = with_timeout("find_donor", timeout, deps.donors.find_donor(&donor_id))
        .await?
        .ok_or_else(|| DispatchError::DonorNotFound(donor_id.clone()))?;

    if let Some(group) = update.blood_group {
        donor.blood_group = group;
    }
    if let Some(rhesus) = update.rhesus_factor {
        donor.rhesus_factor = Some(rhesus);
    }
    if let Some(position) = position {
        donor.position = Some(position);
    }
    donor.updated_at = Some(Utc::now());

    with_timeout("upsert_donor", timeout, deps.donors.upsert_donor(&donor)).await?;

    info!("Donor updated");
    Ok(donor)
}

#[instrument(skip(deps))]
pub async fn remove_donor(donor_id: DonorId, deps: &DispatchDeps) -> Result<(), DispatchError> {
    let removed = with_timeout(
        "remove_donor",
        deps.settings.store_timeout,
        deps.donors.remove_donor(&donor_id),
    )
    .await?;

    if !removed {
        return Err(DispatchError::DonorNotFound(donor_id));
    }

    info!("Donor removed");
    Ok(())
}
