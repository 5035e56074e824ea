//! Subscription Repository

use super::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use shared::models::{Subscription, SubscriptionCreate};
use shared::util::snowflake_id;
use sqlx::SqlitePool;

/// Raw row; `facility_codes` is a JSON array column
#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    sku_code: String,
    facility_codes: String,
    notify_on_available: bool,
    notify_on_unavailable: bool,
    auto_order: bool,
    match_count: i64,
    last_matched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl SubscriptionRow {
    fn into_model(self) -> RepoResult<Subscription> {
        Ok(Subscription {
            id: self.id,
            sku_code: self.sku_code,
            facility_codes: serde_json::from_str(&self.facility_codes)?,
            notify_on_available: self.notify_on_available,
            notify_on_unavailable: self.notify_on_unavailable,
            auto_order: self.auto_order,
            match_count: self.match_count,
            last_matched_at: self.last_matched_at,
            created_at: self.created_at,
        })
    }
}

const COLUMNS: &str = "id, sku_code, facility_codes, notify_on_available, notify_on_unavailable, auto_order, match_count, last_matched_at, created_at";

pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<Subscription>> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {COLUMNS} FROM subscription ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(SubscriptionRow::into_model).collect()
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Subscription>> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {COLUMNS} FROM subscription WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(SubscriptionRow::into_model).transpose()
}

/// All subscriptions watching a SKU (matching is refined in memory)
pub async fn find_by_sku(pool: &SqlitePool, sku_code: &str) -> RepoResult<Vec<Subscription>> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {COLUMNS} FROM subscription WHERE sku_code = ?"
    ))
    .bind(sku_code)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(SubscriptionRow::into_model).collect()
}

pub async fn exists_for_sku(pool: &SqlitePool, sku_code: &str) -> RepoResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subscription WHERE sku_code = ?")
            .bind(sku_code)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM subscription")
        .fetch_one(pool)
        .await?)
}

pub async fn create(pool: &SqlitePool, data: SubscriptionCreate) -> RepoResult<Subscription> {
    if data.sku_code.is_empty() {
        return Err(RepoError::Validation("skuCode is required".into()));
    }
    let id = snowflake_id();
    let created_at = Utc::now();
    sqlx::query(
        "INSERT INTO subscription (id, sku_code, facility_codes, notify_on_available, notify_on_unavailable, auto_order, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&data.sku_code)
    .bind(serde_json::to_string(&data.facility_codes)?)
    .bind(data.notify_on_available)
    .bind(data.notify_on_unavailable)
    .bind(data.auto_order)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(Subscription {
        id,
        sku_code: data.sku_code,
        facility_codes: data.facility_codes,
        notify_on_available: data.notify_on_available,
        notify_on_unavailable: data.notify_on_unavailable,
        auto_order: data.auto_order,
        match_count: 0,
        last_matched_at: None,
        created_at,
    })
}

/// Bump the match counter on every subscription hit by a transition
pub async fn record_match(pool: &SqlitePool, ids: &[i64]) -> RepoResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "UPDATE subscription SET match_count = match_count + 1, last_matched_at = ? WHERE id IN ({placeholders})"
    );
    let mut query = sqlx::query(&sql).bind(Utc::now());
    for id in ids {
        query = query.bind(id);
    }
    query.execute(pool).await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<bool> {
    let rows = sqlx::query("DELETE FROM subscription WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected() > 0)
}

/// Remove every subscription; returns how many rows were deleted
pub async fn delete_all(pool: &SqlitePool) -> RepoResult<u64> {
    let rows = sqlx::query("DELETE FROM subscription").execute(pool).await?;
    Ok(rows.rows_affected())
}
