use tracing::{info, instrument, warn};

use crate::common::{DispatchError, RequestId};
use crate::domains::blood::models::{BloodRequest, RequestState};
use crate::kernel::{with_timeout, DispatchDeps};

/// Moves a request to `inactive` and forgets its matches.
///
/// Inactive is terminal: disabling twice is a `Conflict`. Waits for any
/// in-flight round on the request to finish first.
///
/// The ledger is cleared after the state flip, so a failed clear leaves an
/// inactive request with entries behind. Disabling it again clears them
/// before reporting the `Conflict`.
#[instrument(skip(deps))]
pub async fn disable_request(
    request_id: RequestId,
    deps: &DispatchDeps,
) -> Result<BloodRequest, DispatchError> {
    let timeout = deps.settings.store_timeout;
    let _guard = deps.locks.acquire(request_id).await;

    let mut request = with_timeout("find_request", timeout, deps.requests.find_request(request_id))
        .await?
        .ok_or(DispatchError::RequestNotFound(request_id))?;

    let flipped = request.is_active()
        && with_timeout("mark_inactive", timeout, deps.requests.mark_inactive(request_id)).await?;

    with_timeout("clear", timeout, deps.ledger.clear(request_id)).await?;

    if !flipped {
        warn!(request_id = %request_id, "Blood request already inactive");
        return Err(DispatchError::Conflict(request_id));
    }

    request.state = RequestState::Inactive;
    info!(request_id = %request_id, "Blood request disabled");

    Ok(request)
}
