use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use fleetshare_core::reopen::{reopenable_strs, should_reopen};
use fleetshare_core::{
    ClaimError, ClaimRepository, ClaimResult, ExpiredClaim, ExpiryOutcome, WithdrawalOutcome,
};
use fleetshare_shared::pii::Masked;
use fleetshare_shared::{ClaimStatus, RequestClaim, RequestStatus};

pub struct PgClaimRepository {
    pool: PgPool,
}

impl PgClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct ExpiredClaimRow {
    claim_id: Uuid,
    request_id: Uuid,
    host_id: Uuid,
    host_name: String,
    claim_expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ClaimRow {
    id: Uuid,
    host_id: Uuid,
    request_id: Uuid,
    status: String,
    claim_expires_at: Option<DateTime<Utc>>,
    expired_at: Option<DateTime<Utc>>,
    withdrawn_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ClaimRow> for RequestClaim {
    type Error = ClaimError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        Ok(RequestClaim {
            id: row.id,
            host_id: row.host_id,
            request_id: row.request_id,
            status: row.status.parse::<ClaimStatus>()?,
            claim_expires_at: row.claim_expires_at,
            expired_at: row.expired_at,
            withdrawn_at: row.withdrawn_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CLAIM_COLUMNS: &str =
    "id, host_id, request_id, status, claim_expires_at, expired_at, withdrawn_at, created_at, updated_at";

/// Count the request's remaining active claims and reset it to `OPEN` when the
/// reopening rule says so. Returns whether the request was reopened.
///
/// Must run inside the caller's transaction; the request row stays locked
/// until that transaction ends.
async fn reopen_if_vacated(
    conn: &mut PgConnection,
    request_id: Uuid,
    excluding_claim: Option<Uuid>,
    now: DateTime<Utc>,
) -> ClaimResult<bool> {
    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM reservation_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(ClaimError::store)?;

    let status = status
        .ok_or(ClaimError::RequestNotFound(request_id))?
        .parse::<RequestStatus>()?;

    let active = ClaimStatus::active_strs();
    let remaining: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM request_claims
        WHERE request_id = $1
          AND status = ANY($2)
          AND ($3::uuid IS NULL OR id <> $3)
        "#,
    )
    .bind(request_id)
    .bind(&active[..])
    .bind(excluding_claim)
    .fetch_one(&mut *conn)
    .await
    .map_err(ClaimError::store)?;

    if !should_reopen(remaining.max(0) as u64, status) {
        debug!(%request_id, remaining, %status, "Request keeps its status");
        return Ok(false);
    }

    let reopenable = reopenable_strs();
    let result = sqlx::query(
        r#"
        UPDATE reservation_requests
        SET status = $2, updated_at = $3
        WHERE id = $1 AND status = ANY($4)
        "#,
    )
    .bind(request_id)
    .bind(RequestStatus::Open.as_str())
    .bind(now)
    .bind(reopenable.as_slice())
    .execute(&mut *conn)
    .await
    .map_err(ClaimError::store)?;

    Ok(result.rows_affected() > 0)
}

/// Distinct requests behind `claims`, sorted so concurrent withdrawals lock
/// request rows in the same order.
fn touched_requests(claims: &[RequestClaim]) -> Vec<Uuid> {
    let mut touched: Vec<Uuid> = claims.iter().map(|c| c.request_id).collect();
    touched.sort();
    touched.dedup();
    touched
}

#[async_trait]
impl ClaimRepository for PgClaimRepository {
    async fn find_expired_pending_claims(
        &self,
        now: DateTime<Utc>,
    ) -> ClaimResult<Vec<ExpiredClaim>> {
        let rows: Vec<ExpiredClaimRow> = sqlx::query_as(
            r#"
            SELECT c.id AS claim_id, c.request_id, c.host_id,
                   COALESCE(h.name, 'Unknown host') AS host_name,
                   c.claim_expires_at
            FROM request_claims c
            LEFT JOIN rental_hosts h ON h.id = c.host_id
            WHERE c.status = $1
              AND c.claim_expires_at IS NOT NULL
              AND c.claim_expires_at < $2
            ORDER BY c.claim_expires_at
            "#,
        )
        .bind(ClaimStatus::PendingCar.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(ClaimError::store)?;

        Ok(rows
            .into_iter()
            .map(|row| ExpiredClaim {
                claim_id: row.claim_id,
                request_id: row.request_id,
                host_id: row.host_id,
                host_name: Masked(row.host_name),
                claim_expires_at: row.claim_expires_at,
            })
            .collect())
    }

    async fn expire_claim(
        &self,
        claim_id: Uuid,
        now: DateTime<Utc>,
    ) -> ClaimResult<ExpiryOutcome> {
        let mut tx = self.pool.begin().await.map_err(ClaimError::store)?;

        let expired_request: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE request_claims
            SET status = $2, expired_at = $3, updated_at = $3
            WHERE id = $1 AND status = $4
            RETURNING request_id
            "#,
        )
        .bind(claim_id)
        .bind(ClaimStatus::Expired.as_str())
        .bind(now)
        .bind(ClaimStatus::PendingCar.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(ClaimError::store)?;

        let Some(request_id) = expired_request else {
            // Settled since the sweep selected it
            let existing: Option<Uuid> =
                sqlx::query_scalar("SELECT request_id FROM request_claims WHERE id = $1")
                    .bind(claim_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(ClaimError::store)?;
            tx.rollback().await.map_err(ClaimError::store)?;

            let request_id = existing.ok_or(ClaimError::ClaimNotFound(claim_id))?;
            return Ok(ExpiryOutcome { expired: false, request_id, reopened: false });
        };

        let reopened = reopen_if_vacated(&mut tx, request_id, Some(claim_id), now).await?;

        tx.commit().await.map_err(ClaimError::store)?;

        Ok(ExpiryOutcome { expired: true, request_id, reopened })
    }

    async fn list_active_claims(
        &self,
        host_id: Uuid,
    ) -> ClaimResult<Vec<RequestClaim>> {
        let active = ClaimStatus::active_strs();
        let rows: Vec<ClaimRow> = sqlx::query_as(&format!(
            "SELECT {} FROM request_claims WHERE host_id = $1 AND status = ANY($2) ORDER BY created_at",
            CLAIM_COLUMNS
        ))
        .bind(host_id)
        .bind(&active[..])
        .fetch_all(&self.pool)
        .await
        .map_err(ClaimError::store)?;

        rows.into_iter().map(RequestClaim::try_from).collect()
    }

    async fn withdraw_claims(
        &self,
        host_id: Uuid,
        claim_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> ClaimResult<WithdrawalOutcome> {
        if claim_ids.is_empty() {
            return Ok(WithdrawalOutcome::default());
        }

        let active = ClaimStatus::active_strs();
        let mut tx = self.pool.begin().await.map_err(ClaimError::store)?;

        let rows: Vec<ClaimRow> = sqlx::query_as(&format!(
            r#"
            UPDATE request_claims
            SET status = $3, withdrawn_at = $4, updated_at = $4
            WHERE id = ANY($1) AND host_id = $2 AND status = ANY($5)
            RETURNING {}
            "#,
            CLAIM_COLUMNS
        ))
        .bind(claim_ids)
        .bind(host_id)
        .bind(ClaimStatus::Withdrawn.as_str())
        .bind(now)
        .bind(&active[..])
        .fetch_all(&mut *tx)
        .await
        .map_err(ClaimError::store)?;

        let withdrawn = rows
            .into_iter()
            .map(RequestClaim::try_from)
            .collect::<ClaimResult<Vec<_>>>()?;

        // Recount after the bulk update so claims on the same request see each other gone
        let mut reopened_requests = Vec::new();
        for request_id in touched_requests(&withdrawn) {
            if reopen_if_vacated(&mut tx, request_id, None, now).await? {
                reopened_requests.push(request_id);
            }
        }

        tx.commit().await.map_err(ClaimError::store)?;

        Ok(WithdrawalOutcome { withdrawn, reopened_requests })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seed_host(pool: &PgPool, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO rental_hosts (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    async fn seed_request(pool: &PgPool, status: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO reservation_requests (id, status) VALUES ($1, $2)")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    async fn seed_claim(
        pool: &PgPool,
        host_id: Uuid,
        request_id: Uuid,
        status: ClaimStatus,
        claim_expires_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO request_claims (id, host_id, request_id, status, claim_expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(host_id)
        .bind(request_id)
        .bind(status.as_str())
        .bind(claim_expires_at)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn claim_status(pool: &PgPool, id: Uuid) -> String {
        sqlx::query_scalar("SELECT status FROM request_claims WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn request_status(pool: &PgPool, id: Uuid) -> String {
        sqlx::query_scalar("SELECT status FROM reservation_requests WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn lapsed() -> DateTime<Utc> {
        Utc::now() - Duration::hours(1)
    }

    fn upcoming() -> DateTime<Utc> {
        Utc::now() + Duration::hours(1)
    }

    #[test]
    fn test_touched_requests_are_distinct_and_sorted() {
        let (r1, r2) = {
            let mut ids = [Uuid::new_v4(), Uuid::new_v4()];
            ids.sort();
            (ids[0], ids[1])
        };
        let host = Uuid::new_v4();
        let claims: Vec<RequestClaim> = [r2, r1, r2]
            .into_iter()
            .map(|r| RequestClaim::pending(host, r, Duration::minutes(5)).unwrap())
            .collect();

        assert_eq!(touched_requests(&claims), vec![r1, r2]);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_expiring_last_claim_reopens_request(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let host = seed_host(&pool, "Avery Chen").await;
        let request = seed_request(&pool, "CLAIMED").await;
        let claim = seed_claim(&pool, host, request, ClaimStatus::PendingCar, lapsed()).await;

        let now = Utc::now();
        let found = repo.find_expired_pending_claims(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].claim_id, claim);
        assert_eq!(found[0].host_name.0, "Avery Chen");

        let outcome = repo.expire_claim(claim, now).await.unwrap();

        assert_eq!(outcome, ExpiryOutcome { expired: true, request_id: request, reopened: true });
        assert_eq!(claim_status(&pool, claim).await, "EXPIRED");
        assert_eq!(request_status(&pool, request).await, "OPEN");

        let expired_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT expired_at FROM request_claims WHERE id = $1")
                .bind(claim)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(expired_at.is_some());
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_expiry_keeps_request_held_by_another_claim(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let lapsed_host = seed_host(&pool, "Blake").await;
        let other_host = seed_host(&pool, "Casey").await;
        let request = seed_request(&pool, "CAR_ASSIGNED").await;
        let stale =
            seed_claim(&pool, lapsed_host, request, ClaimStatus::PendingCar, lapsed()).await;
        seed_claim(&pool, other_host, request, ClaimStatus::CarSelected, lapsed()).await;

        let outcome = repo.expire_claim(stale, Utc::now()).await.unwrap();

        assert!(outcome.expired);
        assert!(!outcome.reopened);
        assert_eq!(request_status(&pool, request).await, "CAR_ASSIGNED");
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_sweep_candidates_skip_live_and_selected_claims(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let host = seed_host(&pool, "Drew").await;
        let request = seed_request(&pool, "CLAIMED").await;
        seed_claim(&pool, host, request, ClaimStatus::PendingCar, upcoming()).await;
        seed_claim(&pool, host, request, ClaimStatus::CarSelected, lapsed()).await;

        let found = repo.find_expired_pending_claims(Utc::now()).await.unwrap();

        assert!(found.is_empty());
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_expiring_settled_claim_writes_nothing(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let host = seed_host(&pool, "Emery").await;
        let request = seed_request(&pool, "CLAIMED").await;
        let claim = seed_claim(&pool, host, request, ClaimStatus::Withdrawn, lapsed()).await;

        let outcome = repo.expire_claim(claim, Utc::now()).await.unwrap();

        assert_eq!(outcome, ExpiryOutcome { expired: false, request_id: request, reopened: false });
        assert_eq!(claim_status(&pool, claim).await, "WITHDRAWN");
        assert_eq!(request_status(&pool, request).await, "CLAIMED");

        let missing = repo.expire_claim(Uuid::new_v4(), Utc::now()).await.unwrap_err();
        assert!(matches!(missing, ClaimError::ClaimNotFound(_)));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_failed_expiry_rolls_back_claim(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let host = seed_host(&pool, "Finley").await;
        let request = seed_request(&pool, "ARCHIVED").await;
        let claim = seed_claim(&pool, host, request, ClaimStatus::PendingCar, lapsed()).await;

        let err = repo.expire_claim(claim, Utc::now()).await.unwrap_err();

        assert!(matches!(err, ClaimError::Corrupt(_)));
        assert_eq!(claim_status(&pool, claim).await, "PENDING_CAR");
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_withdrawal_reopens_only_vacated_requests(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let host = seed_host(&pool, "Harper").await;
        let rival = seed_host(&pool, "Indigo").await;
        let alone = seed_request(&pool, "CLAIMED").await;
        let shared = seed_request(&pool, "CLAIMED").await;
        let booked = seed_request(&pool, "BOOKED").await;
        let c1 = seed_claim(&pool, host, alone, ClaimStatus::PendingCar, upcoming()).await;
        let c2 = seed_claim(&pool, host, shared, ClaimStatus::CarSelected, upcoming()).await;
        let c3 = seed_claim(&pool, host, booked, ClaimStatus::PendingCar, upcoming()).await;
        let kept = seed_claim(&pool, rival, shared, ClaimStatus::PendingCar, upcoming()).await;

        let active = repo.list_active_claims(host).await.unwrap();
        assert_eq!(active.len(), 3);
        let ids: Vec<Uuid> = active.iter().map(|c| c.id).collect();

        let outcome = repo.withdraw_claims(host, &ids, Utc::now()).await.unwrap();

        assert_eq!(outcome.withdrawn.len(), 3);
        assert!(outcome.withdrawn.iter().all(|c| c.status == ClaimStatus::Withdrawn));
        assert_eq!(outcome.reopened_requests, vec![alone]);
        for claim in [c1, c2, c3] {
            assert_eq!(claim_status(&pool, claim).await, "WITHDRAWN");
        }
        assert_eq!(claim_status(&pool, kept).await, "PENDING_CAR");
        assert_eq!(request_status(&pool, alone).await, "OPEN");
        assert_eq!(request_status(&pool, shared).await, "CLAIMED");
        assert_eq!(request_status(&pool, booked).await, "BOOKED");
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_failed_withdrawal_leaves_every_claim_active(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let host = seed_host(&pool, "Jules").await;
        let good = seed_request(&pool, "CLAIMED").await;
        let corrupt = seed_request(&pool, "ARCHIVED").await;
        let c1 = seed_claim(&pool, host, good, ClaimStatus::PendingCar, upcoming()).await;
        let c2 = seed_claim(&pool, host, corrupt, ClaimStatus::PendingCar, upcoming()).await;

        let result = repo.withdraw_claims(host, &[c1, c2], Utc::now()).await;

        assert!(result.is_err());
        assert_eq!(claim_status(&pool, c1).await, "PENDING_CAR");
        assert_eq!(claim_status(&pool, c2).await, "PENDING_CAR");
        assert_eq!(request_status(&pool, good).await, "CLAIMED");
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_crossing_withdrawals_both_succeed(pool: PgPool) {
        let repo = PgClaimRepository::new(pool.clone());
        let first = seed_host(&pool, "Kai").await;
        let second = seed_host(&pool, "Logan").await;
        let r1 = seed_request(&pool, "CLAIMED").await;
        let r2 = seed_request(&pool, "CLAIMED").await;
        let first_claims = [
            seed_claim(&pool, first, r1, ClaimStatus::PendingCar, upcoming()).await,
            seed_claim(&pool, first, r2, ClaimStatus::PendingCar, upcoming()).await,
        ];
        let second_claims = [
            seed_claim(&pool, second, r2, ClaimStatus::PendingCar, upcoming()).await,
            seed_claim(&pool, second, r1, ClaimStatus::PendingCar, upcoming()).await,
        ];

        let now = Utc::now();
        let (a, b) = tokio::join!(
            repo.withdraw_claims(first, &first_claims, now),
            repo.withdraw_claims(second, &second_claims, now),
        );

        assert_eq!(a.unwrap().withdrawn.len(), 2);
        assert_eq!(b.unwrap().withdrawn.len(), 2);

        assert_eq!(request_status(&pool, r1).await, "OPEN");
        assert_eq!(request_status(&pool, r2).await, "OPEN");
    }
}
