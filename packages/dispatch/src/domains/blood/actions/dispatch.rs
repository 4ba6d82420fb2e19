//! Dispatch action

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument};

use crate::common::utils::Position;
use crate::common::{DispatchError, DispatchId, RequestId};
use crate::domains::blood::effects::DispatchExecutor;
use crate::domains::blood::models::{BloodRequest, DispatchRound};
use crate::kernel::{retry_transient, with_timeout, DispatchDeps};

pub(crate) fn validate_position(position: Position) -> Result<Position, DispatchError> {
    if position.is_valid() {
        Ok(position)
    } else {
        Err(DispatchError::InvalidPosition {
            longitude: position.longitude,
            latitude: position.latitude,
        })
    }
}

pub(crate) fn validate_radius(radius_m: f64) -> Result<f64, DispatchError> {
    if radius_m.is_finite() && radius_m > 0.0 {
        Ok(radius_m)
    } else {
        Err(DispatchError::InvalidRadius(radius_m))
    }
}

/// Runs one dispatch round for a request and records it.
///
/// Rounds for the same request are serialized. Transient store failures
/// re-run the whole round with linear backoff; the ledger's per-donor
/// idempotence makes a partially applied attempt safe to repeat.
///
/// Errors:
/// - `InvalidPosition` for coordinates outside the indexable range
/// - `RequestNotFound` / `Conflict` (inactive request), never retried
/// - `DuplicateDispatch` when `dispatch_id` names an existing round
/// - `Transient` once retries are exhausted
#[instrument(skip(request_id, position, deps), fields(request_id = %request_id))]
pub async fn dispatch(
    request_id: RequestId,
    position: Position,
    dispatch_id: Option<DispatchId>,
    deps: &DispatchDeps,
) -> Result<DispatchRound, DispatchError> {
    let position = validate_position(position)?;
    let dispatch_id = dispatch_id.unwrap_or_default();
    let insert_issued = AtomicBool::new(false);
    let insert_issued = &insert_issued;

    let _guard = deps.locks.acquire(request_id).await;

    retry_transient(deps.settings.retry, "dispatch_round", move || async move {
        let request = find_active_request(request_id, deps).await?;
        resume_or_run_round(&request, position, dispatch_id, insert_issued, deps).await
    })
    .await
}

/// One attempt of a retried round.
///
/// `insert_issued` is set once an attempt has sent the round to the store.
/// A later attempt that finds the round already recorded for this request
/// returns it: the earlier insert committed even though its reply was lost.
/// A round found before any insert was sent is someone else's ID.
pub(crate) async fn resume_or_run_round(
    request: &BloodRequest,
    position: Position,
    dispatch_id: DispatchId,
    insert_issued: &AtomicBool,
    deps: &DispatchDeps,
) -> Result<DispatchRound, DispatchError> {
    let existing = with_timeout(
        "find_round",
        deps.settings.store_timeout,
        deps.dispatches.find_round(dispatch_id),
    )
    .await?;

    if let Some(round) = existing {
        if insert_issued.load(Ordering::SeqCst) && round.request_id == request.id {
            info!(dispatch_id = %round.id, "Dispatch round already recorded by an earlier attempt");
            return Ok(round);
        }
        return Err(DispatchError::DuplicateDispatch(dispatch_id));
    }

    insert_issued.store(true, Ordering::SeqCst);
    run_round(request, position, dispatch_id, deps).await
}

/// Executes and persists a round. The caller holds the request lock.
async fn run_round(
    request: &BloodRequest,
    position: Position,
    dispatch_id: DispatchId,
    deps: &DispatchDeps,
) -> Result<DispatchRound, DispatchError> {
    let round = DispatchExecutor::from_deps(deps)
        .execute(request, position, dispatch_id)
        .await?;

    let inserted = with_timeout(
        "insert_round",
        deps.settings.store_timeout,
        deps.dispatches.insert_round(&round),
    )
    .await?;
    if !inserted {
        return Err(DispatchError::DuplicateDispatch(dispatch_id));
    }

    info!(
        dispatch_id = %round.id,
        outcome_size = round.outcome_size(),
        "Dispatch round recorded"
    );

    Ok(round)
}

async fn find_active_request(
    request_id: RequestId,
    deps: &DispatchDeps,
) -> Result<BloodRequest, DispatchError> {
    let request = with_timeout(
        "find_request",
        deps.settings.store_timeout,
        deps.requests.find_request(request_id),
    )
    .await?
    .ok_or(DispatchError::RequestNotFound(request_id))?;

    if !request.is_active() {
        return Err(DispatchError::Conflict(request_id));
    }

    Ok(request)
}
