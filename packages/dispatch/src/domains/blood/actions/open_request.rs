use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use tracing::{info, instrument, warn};

use super::dispatch::{resume_or_run_round, validate_position, validate_radius};
use crate::common::utils::Position;
use crate::common::{DispatchError, DispatchId, DonorId};
use crate::domains::blood::models::{BloodGroup, BloodRequest, DispatchRound, RhesusFactor};
use crate::kernel::{retry_transient, with_timeout, DispatchDeps};

/// Input for opening a blood request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub requester_id: DonorId,
    pub blood_group: BloodGroup,
    pub rhesus_factor: RhesusFactor,
    /// Overrides the configured neighbourhood radius for this request.
    pub radius_m: Option<f64>,
    pub position: Position,
}

/// Creates an active request and runs its first dispatch round.
///
/// The request only survives if that first round succeeds; on failure the
/// record is deleted again and the round's error returned.
#[instrument(skip(input, deps), fields(requester_id = %input.requester_id))]
pub async fn open_request(
    input: OpenRequest,
    deps: &DispatchDeps,
) -> Result<(BloodRequest, DispatchRound), DispatchError> {
    let position = validate_position(input.position)?;
    let radius_m = input.radius_m.map(validate_radius).transpose()?;

    let mut request = BloodRequest::new(input.requester_id, input.blood_group, input.rhesus_factor);
    request.radius_m = radius_m;

    with_timeout(
        "insert_request",
        deps.settings.store_timeout,
        deps.requests.insert_request(&request),
    )
    .await?;

    info!(request_id = %request.id, "Blood request opened");

    let first_round = {
        let _guard = deps.locks.acquire(request.id).await;
        let dispatch_id = DispatchId::new();
        let insert_issued = AtomicBool::new(false);
        retry_transient(deps.settings.retry, "dispatch_round", || {
            resume_or_run_round(&request, position, dispatch_id, &insert_issued, deps)
        })
        .await
    };

    match first_round {
        Ok(round) => Ok((request, round)),
        Err(e) => {
            warn!(request_id = %request.id, error = %e, "First dispatch failed, discarding request");
            if let Err(cleanup) = with_timeout(
                "delete_request",
                deps.settings.store_timeout,
                deps.requests.delete_request(request.id),
            )
            .await
            {
                warn!(request_id = %request.id, error = %cleanup, "Failed to discard request");
            }
            Err(e)
        }
    }
}
