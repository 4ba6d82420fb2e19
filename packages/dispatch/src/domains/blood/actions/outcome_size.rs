use crate::common::{DispatchError, DispatchId};
use crate::kernel::{with_timeout, DispatchDeps};

/// Number of donors a recorded round surfaced, across every tier.
pub async fn outcome_size(dispatch_id: DispatchId, deps: &DispatchDeps) -> Result<usize, DispatchError> {
    let round = with_timeout(
        "find_round",
        deps.settings.store_timeout,
        deps.dispatches.find_round(dispatch_id),
    )
    .await?
    .ok_or(DispatchError::DispatchNotFound(dispatch_id))?;

    Ok(round.outcome_size())
}
