//! 订阅注册表
//!
//! SQLite 持久化 + 内存缓存。轮询的每个周期都要按 (SKU, facility) 匹配
//! 订阅，走内存副本；写操作先落库再刷新缓存。

use crate::db::repository::{self, RepoResult};
use provider_client::CatalogPlan;
use shared::models::{BatchSummary, Subscription, SubscriptionCreate, TransitionEvent};
use sqlx::SqlitePool;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct SubscriptionRegistry {
    pool: SqlitePool,
    cache: Arc<RwLock<Arc<Vec<Subscription>>>>,
}

impl SubscriptionRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: Arc::new(RwLock::new(Arc::new(Vec::new()))),
        }
    }

    /// Rebuild the cache from the database
    pub async fn reload(&self) -> RepoResult<usize> {
        let subs = repository::subscription::find_all(&self.pool).await?;
        let count = subs.len();
        self.store(subs);
        Ok(count)
    }

    fn store(&self, subs: Vec<Subscription>) {
        let subs = Arc::new(subs);
        match self.cache.write() {
            Ok(mut guard) => *guard = subs,
            Err(poisoned) => *poisoned.into_inner() = subs,
        }
    }

    /// Cached snapshot; cheap to call per poll cycle
    pub fn list(&self) -> Arc<Vec<Subscription>> {
        match self.cache.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn count(&self) -> usize {
        self.list().len()
    }

    /// Subscriptions covering a transition event
    pub fn matching(&self, event: &TransitionEvent) -> Vec<Subscription> {
        self.list()
            .iter()
            .filter(|s| s.matches(&event.sku_code, &event.facility_code))
            .cloned()
            .collect()
    }

    pub async fn add(&self, data: SubscriptionCreate) -> RepoResult<Subscription> {
        let sub = repository::subscription::create(&self.pool, data).await?;
        self.reload().await?;
        Ok(sub)
    }

    /// Record a transition hit against the given subscriptions
    pub async fn record_matches(&self, subs: &[Subscription]) -> RepoResult<()> {
        let ids: Vec<i64> = subs.iter().map(|s| s.id).collect();
        repository::subscription::record_match(&self.pool, &ids).await?;
        self.reload().await?;
        Ok(())
    }

    /// Returns false when no subscription with this ID existed
    pub async fn remove(&self, id: i64) -> RepoResult<bool> {
        let deleted = repository::subscription::delete(&self.pool, id).await?;
        if deleted {
            self.reload().await?;
        }
        Ok(deleted)
    }

    /// Remove every subscription; returns the removed count
    pub async fn clear(&self) -> RepoResult<u64> {
        let removed = repository::subscription::delete_all(&self.pool).await?;
        self.reload().await?;
        tracing::info!(removed, "All subscriptions removed");
        Ok(removed)
    }

    /// Subscribe to every catalog SKU not yet watched (all facilities,
    /// notify-on-available, no auto-order)
    pub async fn batch_add_all(&self, catalog: &[CatalogPlan]) -> RepoResult<BatchSummary> {
        let mut summary = BatchSummary::default();
        for plan in catalog {
            match repository::subscription::exists_for_sku(&self.pool, &plan.plan_code).await {
                Ok(true) => summary.skipped += 1,
                Ok(false) => {
                    let create = SubscriptionCreate {
                        sku_code: plan.plan_code.clone(),
                        facility_codes: Vec::new(),
                        notify_on_available: true,
                        notify_on_unavailable: false,
                        auto_order: false,
                    };
                    match repository::subscription::create(&self.pool, create).await {
                        Ok(_) => summary.added += 1,
                        Err(e) => summary.errors.push(format!("{}: {e}", plan.plan_code)),
                    }
                }
                Err(e) => summary.errors.push(format!("{}: {e}", plan.plan_code)),
            }
        }
        self.reload().await?;
        tracing::info!(
            added = summary.added,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "Batch subscription completed"
        );
        Ok(summary)
    }
}
