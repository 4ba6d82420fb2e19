//! Postgres implementation of the store traits - SQL persistence layer.
//!
//! Schema lives in `migrations/`. Distances come from the
//! `haversine_distance_m` SQL function; ledger merges rely on the
//! `(request_id, donor_id)` primary key with `ON CONFLICT DO NOTHING`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

use super::traits::{
    BaseDispatchStore, BaseDonorDirectory, BaseDonorRegistry, BaseGeoIndex, BaseMatchLedger,
    BaseRequestStore, StoreResult,
};
use crate::common::utils::Position;
use crate::common::{DispatchId, DonorId, RequestId, StoreError};
use crate::domains::blood::models::{
    BloodGroup, BloodRequest, DispatchRound, Donor, DonorDistance, Outcome, RhesusFactor, Tier,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn corrupt<E: std::fmt::Display>(what: &str) -> impl Fn(E) -> StoreError + '_ {
    move |e| StoreError::Corrupt(format!("{}: {}", what, e))
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct DonorRow {
    id: DonorId,
    blood_group: String,
    rhesus_factor: Option<String>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<DonorRow> for Donor {
    type Error = StoreError;

    fn try_from(row: DonorRow) -> StoreResult<Self> {
        Ok(Donor {
            blood_group: row.blood_group.parse().map_err(corrupt("blood_donors.blood_group"))?,
            rhesus_factor: row
                .rhesus_factor
                .map(|r| r.parse())
                .transpose()
                .map_err(corrupt("blood_donors.rhesus_factor"))?,
            position: row
                .longitude
                .zip(row.latitude)
                .map(|(longitude, latitude)| Position::new(longitude, latitude)),
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: RequestId,
    requester_id: DonorId,
    blood_group: String,
    rhesus_factor: String,
    state: String,
    radius_m: Option<f64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for BloodRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> StoreResult<Self> {
        Ok(BloodRequest {
            id: row.id,
            requester_id: row.requester_id,
            blood_group: row.blood_group.parse().map_err(corrupt("blood_requests.blood_group"))?,
            rhesus_factor: row
                .rhesus_factor
                .parse()
                .map_err(corrupt("blood_requests.rhesus_factor"))?,
            state: row.state.parse().map_err(corrupt("blood_requests.state"))?,
            radius_m: row.radius_m,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DispatchRow {
    id: DispatchId,
    request_id: RequestId,
    created_at: DateTime<Utc>,
    outcome: Option<Json<Outcome>>,
}

impl From<DispatchRow> for DispatchRound {
    fn from(row: DispatchRow) -> Self {
        DispatchRound {
            id: row.id,
            request_id: row.request_id,
            created_at: row.created_at,
            outcome: row.outcome.map(|Json(outcome)| outcome),
        }
    }
}

// =============================================================================
// Engine-facing reads and ledger writes
// =============================================================================

#[async_trait]
impl BaseGeoIndex for PgStore {
    #[instrument(skip(self), fields(lng = %center.longitude, lat = %center.latitude))]
    async fn within_radius(
        &self,
        center: Position,
        radius_m: f64,
    ) -> StoreResult<Vec<DonorDistance>> {
        let rows = sqlx::query_as::<_, (DonorId, f64)>(
            "SELECT d.id, haversine_distance_m($2, $1, d.latitude, d.longitude) AS distance_m
             FROM blood_donors d
             WHERE d.latitude IS NOT NULL
               AND d.longitude IS NOT NULL
               AND haversine_distance_m($2, $1, d.latitude, d.longitude) <= $3
             ORDER BY distance_m ASC, d.id ASC",
        )
        .bind(center.longitude)
        .bind(center.latitude)
        .bind(radius_m)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Neighbourhood loaded");

        Ok(rows
            .into_iter()
            .map(|(donor_id, distance_m)| DonorDistance {
                donor_id,
                distance_m,
            })
            .collect())
    }
}

#[async_trait]
impl BaseDonorRegistry for PgStore {
    async fn members_of_group(&self, group: BloodGroup) -> StoreResult<HashSet<DonorId>> {
        let ids = sqlx::query_scalar::<_, DonorId>("SELECT id FROM blood_donors WHERE blood_group = $1")
            .bind(group.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn members_of_rhesus(&self, rhesus: RhesusFactor) -> StoreResult<HashSet<DonorId>> {
        let ids =
            sqlx::query_scalar::<_, DonorId>("SELECT id FROM blood_donors WHERE rhesus_factor = $1")
                .bind(rhesus.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl BaseMatchLedger for PgStore {
    async fn matched_donors(&self, request_id: RequestId) -> StoreResult<HashSet<DonorId>> {
        let ids = sqlx::query_scalar::<_, DonorId>(
            "SELECT donor_id FROM blood_request_matches WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    #[instrument(skip(self, matches), fields(request_id = %request_id, tier = %tier, count = matches.len()))]
    async fn merge(
        &self,
        request_id: RequestId,
        tier: Tier,
        matches: &[DonorDistance],
    ) -> StoreResult<()> {
        if matches.is_empty() {
            return Ok(());
        }

        let donor_ids: Vec<String> = matches
            .iter()
            .map(|m| m.donor_id.as_str().to_string())
            .collect();
        let distances: Vec<f64> = matches.iter().map(|m| m.distance_m).collect();

        sqlx::query(
            "INSERT INTO blood_request_matches (request_id, donor_id, blood_group, rhesus, distance_m)
             SELECT $1, m.donor_id, $2, $3, m.distance_m
             FROM UNNEST($4::text[], $5::float8[]) AS m(donor_id, distance_m)
             ON CONFLICT (request_id, donor_id) DO NOTHING",
        )
        .bind(request_id)
        .bind(tier.group.as_str())
        .bind(tier.rhesus.as_str())
        .bind(&donor_ids)
        .bind(&distances)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn read(
        &self,
        request_id: RequestId,
        tier: Tier,
    ) -> StoreResult<BTreeMap<DonorId, f64>> {
        let rows = sqlx::query_as::<_, (DonorId, f64)>(
            "SELECT donor_id, distance_m
             FROM blood_request_matches
             WHERE request_id = $1 AND blood_group = $2 AND rhesus = $3",
        )
        .bind(request_id)
        .bind(tier.group.as_str())
        .bind(tier.rhesus.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn clear(&self, request_id: RequestId) -> StoreResult<()> {
        sqlx::query("DELETE FROM blood_request_matches WHERE request_id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Records
// =============================================================================

#[async_trait]
impl BaseRequestStore for PgStore {
    async fn insert_request(&self, request: &BloodRequest) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO blood_requests (id, requester_id, blood_group, rhesus_factor, state, radius_m, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(request.id)
        .bind(&request.requester_id)
        .bind(request.blood_group.as_str())
        .bind(request.rhesus_factor.as_str())
        .bind(request.state.as_str())
        .bind(request.radius_m)
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_request(&self, id: RequestId) -> StoreResult<Option<BloodRequest>> {
        sqlx::query_as::<_, RequestRow>("SELECT * FROM blood_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(BloodRequest::try_from)
            .transpose()
    }

    async fn mark_inactive(&self, id: RequestId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE blood_requests SET state = 'inactive' WHERE id = $1 AND state = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_request(&self, id: RequestId) -> StoreResult<()> {
        sqlx::query("DELETE FROM blood_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BaseDispatchStore for PgStore {
    async fn insert_round(&self, round: &DispatchRound) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO blood_dispatches (id, request_id, created_at, outcome)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(round.id)
        .bind(round.request_id)
        .bind(round.created_at)
        .bind(round.outcome.as_ref().map(Json))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_round(&self, id: DispatchId) -> StoreResult<Option<DispatchRound>> {
        Ok(
            sqlx::query_as::<_, DispatchRow>("SELECT * FROM blood_dispatches WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(DispatchRound::from),
        )
    }
}

#[async_trait]
impl BaseDonorDirectory for PgStore {
    async fn upsert_donor(&self, donor: &Donor) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO blood_donors (id, blood_group, rhesus_factor, longitude, latitude, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE
             SET blood_group = EXCLUDED.blood_group,
                 rhesus_factor = EXCLUDED.rhesus_factor,
                 longitude = EXCLUDED.longitude,
                 latitude = EXCLUDED.latitude,
                 updated_at = NOW()",
        )
        .bind(&donor.id)
        .bind(donor.blood_group.as_str())
        .bind(donor.rhesus_factor.map(|r| r.as_str()))
        .bind(donor.position.map(|p| p.longitude))
        .bind(donor.position.map(|p| p.latitude))
        .bind(donor.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_donor(&self, id: &DonorId) -> StoreResult<Option<Donor>> {
        sqlx::query_as::<_, DonorRow>("SELECT * FROM blood_donors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Donor::try_from)
            .transpose()
    }

    async fn remove_donor(&self, id: &DonorId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM blood_donors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
