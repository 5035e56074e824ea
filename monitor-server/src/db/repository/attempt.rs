//! Order Attempt Repository
//!
//! Append-only audit trail. Rows are inserted once per provider order call
//! and never updated or deleted, including for canceled tasks.

use super::RepoResult;
use chrono::{DateTime, Utc};
use shared::models::{AttemptOutcome, OrderAttempt};
use shared::util::snowflake_id;
use sqlx::SqlitePool;

pub struct AttemptRecord<'a> {
    pub task_id: i64,
    pub attempt_number: i64,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub provider_code: Option<&'a str>,
    pub message: Option<&'a str>,
}

pub async fn insert(pool: &SqlitePool, record: AttemptRecord<'_>) -> RepoResult<i64> {
    let id = snowflake_id();
    sqlx::query(
        "INSERT INTO order_attempt
           (id, task_id, attempt_number, started_at, finished_at, outcome, provider_code, message)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(record.task_id)
    .bind(record.attempt_number)
    .bind(record.started_at)
    .bind(Utc::now())
    .bind(record.outcome.as_str())
    .bind(record.provider_code)
    .bind(record.message)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn find_by_task(pool: &SqlitePool, task_id: i64) -> RepoResult<Vec<OrderAttempt>> {
    Ok(sqlx::query_as::<_, OrderAttempt>(
        "SELECT id, task_id, attempt_number, started_at, finished_at, outcome, provider_code, message
         FROM order_attempt WHERE task_id = ? ORDER BY attempt_number",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?)
}
