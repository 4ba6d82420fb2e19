//! Request lifecycle, donor registration and failure handling.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use dispatch_core::common::utils::Position;
use dispatch_core::common::{DispatchError, DispatchId, DonorId, RequestId, StoreError};
use dispatch_core::config::DispatchSettings;
use dispatch_core::domains::blood::actions::{self, OpenRequest, RegisterDonor, UpdateDonor};
use dispatch_core::domains::blood::models::{
    BloodGroup::{A, O},
    RequestState,
    RhesusFactor::{Negative as NEG, Positive as POS},
    Tier,
};
use dispatch_core::kernel::BaseRequestStore;

fn open_input(requester: &str) -> OpenRequest {
    OpenRequest {
        requester_id: DonorId::from(requester),
        blood_group: O,
        rhesus_factor: NEG,
        radius_m: None,
        position: ORIGIN,
    }
}

// =============================================================================
// Open / disable
// =============================================================================

#[tokio::test]
async fn test_open_request_runs_the_first_round() {
    let harness = MemoryHarness::new();
    harness.donor("o-neg", O, Some(NEG), 2_000.0).await;

    let (request, round) = actions::open_request(open_input("requester"), &harness.deps)
        .await
        .unwrap();

    assert_eq!(request.state, RequestState::Active);
    assert_eq!(round.request_id, request.id);
    assert_eq!(round.outcome_size(), 1);

    let stored = harness.store.find_request(request.id).await.unwrap();
    assert_eq!(stored, Some(request));
}

#[tokio::test]
async fn test_open_request_is_discarded_when_first_round_fails() {
    let mut harness = MemoryHarness::new();
    harness.deps = harness
        .deps
        .clone()
        .with_registry(Arc::new(UnavailableRegistry));
    harness.donor("o-neg", O, Some(NEG), 2_000.0).await;

    let err = actions::open_request(open_input("requester"), &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transient { attempts: 4, .. }));

    assert_eq!(harness.store.request_count().await, 0);
    assert!(harness.deps.locks.is_empty());
}

#[tokio::test]
async fn test_open_request_rejects_unindexable_position() {
    let harness = MemoryHarness::new();
    let mut input = open_input("requester");
    input.position = Position::new(10.0, 86.0);

    let err = actions::open_request(input, &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::InvalidPosition { latitude, .. } if latitude == 86.0
    ));
}

#[tokio::test]
async fn test_disable_is_terminal() {
    let harness = MemoryHarness::new();
    harness.donor("o-neg", O, Some(NEG), 2_000.0).await;
    let (request, _) = actions::open_request(open_input("requester"), &harness.deps)
        .await
        .unwrap();
    assert_eq!(harness.store.ledger_size(request.id).await, 1);

    let disabled = actions::disable_request(request.id, &harness.deps)
        .await
        .unwrap();
    assert_eq!(disabled.state, RequestState::Inactive);
    assert_eq!(harness.store.ledger_size(request.id).await, 0);

    let again = actions::disable_request(request.id, &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(again, DispatchError::Conflict(id) if id == request.id));

    let dispatch = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(dispatch, DispatchError::Conflict(_)));
    assert!(!dispatch.is_retryable());
}

#[tokio::test]
async fn test_disable_retry_clears_ledger_left_by_failed_clear() {
    let mut harness = MemoryHarness::new();
    harness.deps = harness
        .deps
        .clone()
        .with_ledger(Arc::new(FlakyClearLedger::new(harness.store.clone(), 1)));
    harness.donor("o-neg", O, Some(NEG), 2_000.0).await;
    let request = harness.request("requester", O, NEG).await;
    actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap();

    let first = actions::disable_request(request.id, &harness.deps)
        .await
        .unwrap_err();
    assert!(first.is_retryable());
    assert_eq!(harness.store.ledger_size(request.id).await, 1);

    let second = actions::disable_request(request.id, &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(second, DispatchError::Conflict(id) if id == request.id));
    assert_eq!(harness.store.ledger_size(request.id).await, 0);

    let stored = harness.store.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(stored.state, RequestState::Inactive);
}

#[tokio::test]
async fn test_open_request_rejects_unusable_radius() {
    let harness = MemoryHarness::new();

    for radius in [0.0, -5_000.0, f64::NAN, f64::INFINITY] {
        let mut input = open_input("requester");
        input.radius_m = Some(radius);

        let err = actions::open_request(input, &harness.deps)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRadius(_)), "radius {radius}");
        assert!(!err.is_retryable());
    }
    assert_eq!(harness.store.request_count().await, 0);

    let mut input = open_input("requester");
    input.radius_m = Some(12_000.0);
    let (request, _) = actions::open_request(input, &harness.deps).await.unwrap();
    assert_eq!(request.radius_m, Some(12_000.0));
}

// =============================================================================
// Not found
// =============================================================================

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let harness = MemoryHarness::new();
    let request_id = RequestId::new();
    let dispatch_id = DispatchId::new();

    let err = actions::dispatch(request_id, ORIGIN, None, &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::RequestNotFound(id) if id == request_id));

    let err = actions::disable_request(request_id, &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::RequestNotFound(_)));

    let err = actions::outcome_size(dispatch_id, &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::DispatchNotFound(id) if id == dispatch_id));
}

#[tokio::test]
async fn test_dispatch_rejects_invalid_position_before_lookup() {
    let harness = MemoryHarness::new();

    let err = actions::dispatch(
        RequestId::new(),
        Position::new(181.0, 0.0),
        None,
        &harness.deps,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DispatchError::InvalidPosition { .. }));
}

// =============================================================================
// Transient failures
// =============================================================================

#[tokio::test]
async fn test_round_recovers_from_transient_failures() {
    let harness = MemoryHarness::new();
    harness.donor("o-neg", O, Some(NEG), 2_000.0).await;
    let request = harness.request("requester", O, NEG).await;

    harness.store.fail_next(2);
    let round = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap();

    assert_eq!(round.outcome_size(), 1);
    assert_eq!(harness.store.ledger_size(request.id).await, 1);
}

#[tokio::test]
async fn test_exhausted_retries_surface_as_transient() {
    let harness = MemoryHarness::new();
    let request = harness.request("requester", O, NEG).await;

    harness.store.fail_next(100);
    let err = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap_err();
    harness.store.fail_next(0);

    assert!(err.is_retryable());
    assert!(matches!(
        err,
        DispatchError::Transient {
            attempts: 4,
            source: StoreError::Unavailable(_),
        }
    ));
}

#[tokio::test]
async fn test_slow_store_times_out_as_transient() {
    let harness = MemoryHarness::with_settings(DispatchSettings {
        store_timeout: Duration::from_millis(10),
        ..test_settings()
    });
    let request = harness.request("requester", O, NEG).await;

    harness.store.set_latency(Duration::from_millis(200));
    let err = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Transient {
            source: StoreError::Timeout { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_retry_after_partial_round_keeps_earlier_merges() {
    let mut harness = MemoryHarness::new();
    // The A+ tier merges, then the O+ tier's group query fails once.
    harness.deps = harness
        .deps
        .clone()
        .with_registry(Arc::new(FlakyRegistry::new(harness.store.clone(), O, 1)));
    harness.donor("a-pos", A, Some(POS), 1_000.0).await;
    harness.donor("o-pos", O, Some(POS), 2_000.0).await;
    let request = harness.request("requester", A, POS).await;

    let round = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap();

    // The retried round sees a-pos as already matched and only adds o-pos.
    assert_eq!(round.outcome_size(), 1);
    assert!(round.outcome.as_ref().unwrap().contains(&DonorId::from("o-pos")));

    let ledger = harness.store.ledger_snapshot(request.id).await;
    assert_eq!(harness.store.ledger_size(request.id).await, 2);
    assert!(ledger[&Tier::exact(A, POS)].contains_key(&DonorId::from("a-pos")));
    assert!(ledger[&Tier::exact(O, POS)].contains_key(&DonorId::from("o-pos")));
}

#[tokio::test]
async fn test_round_recorded_before_lost_reply_is_returned() {
    let mut harness = MemoryHarness::new();
    harness.deps = harness
        .deps
        .clone()
        .with_dispatches(Arc::new(LostReplyDispatches::new(harness.store.clone(), 1)));
    harness.donor("o-neg", O, Some(NEG), 2_000.0).await;
    let request = harness.request("requester", O, NEG).await;

    let round = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap();

    assert_eq!(round.request_id, request.id);
    assert_eq!(round.outcome_size(), 1);
    assert!(round.outcome.as_ref().unwrap().contains(&DonorId::from("o-neg")));
    assert_eq!(actions::outcome_size(round.id, &harness.deps).await.unwrap(), 1);
}

#[tokio::test]
async fn test_open_request_survives_lost_first_round_reply() {
    let mut harness = MemoryHarness::new();
    harness.deps = harness
        .deps
        .clone()
        .with_dispatches(Arc::new(LostReplyDispatches::new(harness.store.clone(), 1)));
    harness.donor("o-neg", O, Some(NEG), 2_000.0).await;

    let (request, round) = actions::open_request(open_input("requester"), &harness.deps)
        .await
        .unwrap();

    assert_eq!(round.outcome_size(), 1);
    assert_eq!(harness.store.request_count().await, 1);
    assert_eq!(round.request_id, request.id);
}

// =============================================================================
// Donor registration
// =============================================================================

#[tokio::test]
async fn test_donor_update_moves_between_tiers() {
    let harness = MemoryHarness::new();
    actions::register_donor(
        RegisterDonor {
            id: DonorId::from("donor"),
            blood_group: A,
            rhesus_factor: None,
            position: Some(ORIGIN),
        },
        &harness.deps,
    )
    .await
    .unwrap();

    let updated = actions::update_donor(
        DonorId::from("donor"),
        UpdateDonor {
            blood_group: Some(O),
            rhesus_factor: Some(NEG),
            position: None,
        },
        &harness.deps,
    )
    .await
    .unwrap();
    assert_eq!(updated.blood_group, O);
    assert_eq!(updated.position, Some(ORIGIN));
    assert!(updated.updated_at.is_some());

    let request = harness.request("requester", O, NEG).await;
    let round = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap();
    let outcome = round.outcome.unwrap();
    assert!(outcome.tier(&Tier::exact(O, NEG)).unwrap().contains_key(&DonorId::from("donor")));
}

#[tokio::test]
async fn test_removed_donor_is_gone() {
    let harness = MemoryHarness::new();
    harness.donor("donor", O, Some(NEG), 1_000.0).await;

    actions::remove_donor(DonorId::from("donor"), &harness.deps)
        .await
        .unwrap();

    let err = actions::remove_donor(DonorId::from("donor"), &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::DonorNotFound(_)));

    let err = actions::update_donor(DonorId::from("donor"), UpdateDonor::default(), &harness.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::DonorNotFound(_)));

    let request = harness.request("requester", O, NEG).await;
    let round = actions::dispatch(request.id, ORIGIN, None, &harness.deps)
        .await
        .unwrap();
    assert!(round.outcome.is_none());
}
