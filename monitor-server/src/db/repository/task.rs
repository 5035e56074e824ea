//! Acquisition Task Repository
//!
//! State transitions are guarded in SQL (`WHERE state = ...`) so the
//! monotonicity invariant holds even if two callers race: a terminal row
//! can never be flipped back, and an update that lost the race affects
//! zero rows instead of clobbering.

use super::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use shared::models::{AcquisitionTask, TaskKey, TaskState};
use shared::util::snowflake_id;
use sqlx::SqlitePool;

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    sku_code: String,
    facility_code: String,
    options: String,
    state: String,
    attempts: i64,
    last_error: Option<String>,
    order_id: Option<String>,
    order_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_model(self) -> RepoResult<AcquisitionTask> {
        let state: TaskState = self
            .state
            .parse()
            .map_err(|e| RepoError::Database(format!("task {}: {e}", self.id)))?;
        Ok(AcquisitionTask {
            id: self.id,
            sku_code: self.sku_code,
            facility_code: self.facility_code,
            options: serde_json::from_str(&self.options)?,
            state,
            attempts: self.attempts,
            last_error: self.last_error,
            order_id: self.order_id,
            order_url: self.order_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const COLUMNS: &str = "id, sku_code, facility_code, options, state, attempts, last_error, order_id, order_url, created_at, updated_at";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<AcquisitionTask>> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {COLUMNS} FROM acquisition_task WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(TaskRow::into_model).transpose()
}

/// List tasks, newest first. `active_only` restricts to non-terminal states.
pub async fn find_all(pool: &SqlitePool, active_only: bool) -> RepoResult<Vec<AcquisitionTask>> {
    let sql = if active_only {
        format!(
            "SELECT {COLUMNS} FROM acquisition_task WHERE state IN ('queued', 'attempting') ORDER BY created_at DESC"
        )
    } else {
        format!("SELECT {COLUMNS} FROM acquisition_task ORDER BY created_at DESC")
    };
    let rows = sqlx::query_as::<_, TaskRow>(&sql).fetch_all(pool).await?;
    rows.into_iter().map(TaskRow::into_model).collect()
}

/// The non-terminal task holding this key, if any
pub async fn find_active_by_key(
    pool: &SqlitePool,
    key: &TaskKey,
) -> RepoResult<Option<AcquisitionTask>> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {COLUMNS} FROM acquisition_task
         WHERE sku_code = ? AND facility_code = ? AND options_key = ?
           AND state IN ('queued', 'attempting')"
    ))
    .bind(&key.sku_code)
    .bind(&key.facility_code)
    .bind(key.options_key())
    .fetch_optional(pool)
    .await?;
    row.map(TaskRow::into_model).transpose()
}

/// Insert a fresh queued task for the key
pub async fn create(pool: &SqlitePool, key: &TaskKey) -> RepoResult<AcquisitionTask> {
    let id = snowflake_id();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO acquisition_task
           (id, sku_code, facility_code, options_key, options, state, attempts, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'queued', 0, ?, ?)",
    )
    .bind(id)
    .bind(&key.sku_code)
    .bind(&key.facility_code)
    .bind(key.options_key())
    .bind(serde_json::to_string(&key.options)?)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(AcquisitionTask {
        id,
        sku_code: key.sku_code.clone(),
        facility_code: key.facility_code.clone(),
        options: key.options.clone(),
        state: TaskState::Queued,
        attempts: 0,
        last_error: None,
        order_id: None,
        order_url: None,
        created_at: now,
        updated_at: now,
    })
}

/// queued → attempting, bumping the attempt counter.
///
/// Returns the new attempt number, or `None` when the task was no longer
/// `queued` (canceled meanwhile).
pub async fn begin_attempt(pool: &SqlitePool, id: i64) -> RepoResult<Option<i64>> {
    let attempts: Option<i64> = sqlx::query_scalar(
        "UPDATE acquisition_task
         SET state = 'attempting', attempts = attempts + 1, updated_at = ?
         WHERE id = ? AND state = 'queued'
         RETURNING attempts",
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(attempts)
}

/// attempting → succeeded with the provider order reference
pub async fn mark_succeeded(
    pool: &SqlitePool,
    id: i64,
    order_id: &str,
    order_url: &str,
) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE acquisition_task
         SET state = 'succeeded', last_error = NULL, order_id = ?, order_url = ?, updated_at = ?
         WHERE id = ? AND state = 'attempting'",
    )
    .bind(order_id)
    .bind(order_url)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    guard_transition(rows.rows_affected(), id, "succeeded")
}

/// attempting → failed
pub async fn mark_failed(pool: &SqlitePool, id: i64, error: &str) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE acquisition_task
         SET state = 'failed', last_error = ?, updated_at = ?
         WHERE id = ? AND state = 'attempting'",
    )
    .bind(error)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    guard_transition(rows.rows_affected(), id, "failed")
}

/// attempting → queued for a bounded retry (budget enforced by the worker)
pub async fn requeue_for_retry(pool: &SqlitePool, id: i64, error: &str) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE acquisition_task
         SET state = 'queued', last_error = ?, updated_at = ?
         WHERE id = ? AND state = 'attempting'",
    )
    .bind(error)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    guard_transition(rows.rows_affected(), id, "queued (retry)")
}

/// queued → canceled. Returns false when the task was not `queued`.
pub async fn cancel(pool: &SqlitePool, id: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE acquisition_task
         SET state = 'canceled', updated_at = ?
         WHERE id = ? AND state = 'queued'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// IDs of queued tasks in FIFO order (startup reload)
pub async fn queued_ids(pool: &SqlitePool) -> RepoResult<Vec<i64>> {
    Ok(sqlx::query_scalar(
        "SELECT id FROM acquisition_task WHERE state = 'queued' ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?)
}

/// Fail every task stuck in `attempting` (crash recovery).
///
/// The provider call outcome for these is unknown; re-queuing could place
/// a second real-money order, so they fail loudly instead.
pub async fn fail_interrupted(pool: &SqlitePool) -> RepoResult<u64> {
    let rows = sqlx::query(
        "UPDATE acquisition_task
         SET state = 'failed', last_error = 'interrupted: attempt outcome unknown', updated_at = ?
         WHERE state = 'attempting'",
    )
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(rows.rows_affected())
}

pub async fn count_by_state(pool: &SqlitePool, state: TaskState) -> RepoResult<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM acquisition_task WHERE state = ?")
            .bind(state.as_str())
            .fetch_one(pool)
            .await?,
    )
}

fn guard_transition(affected: u64, id: i64, target: &str) -> RepoResult<()> {
    if affected == 1 {
        Ok(())
    } else {
        // A terminal row can never be flipped; reaching this means the
        // single-flight lock was bypassed somewhere.
        Err(RepoError::Database(format!(
            "invariant violation: task {id} refused transition to {target}"
        )))
    }
}
