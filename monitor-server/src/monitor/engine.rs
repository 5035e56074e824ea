//! 监控引擎装配
//!
//! 把索引、差分、订阅、队列、限速、通知装到一起，暴露控制面
//! （启停、调节间隔、手动入队、统计）给 HTTP 层。

use super::diff::diff_snapshots;
use super::fetcher;
use super::index::AvailabilityIndex;
use super::keylock::KeyLockTable;
use super::notify::Notifier;
use super::queue::AcquisitionQueue;
use super::ratelimit::RateLimiter;
use super::scheduler::PollInterval;
use super::subscriptions::SubscriptionRegistry;
use super::worker::{RetryPolicy, WorkerContext};
use crate::core::config::Config;
use crate::db::repository::{self, RepoResult};
use chrono::{DateTime, Utc};
use provider_client::{CatalogPlan, ProviderApi, ProviderResult};
use shared::models::{
    EngineStats, EnqueueReceipt, MonitorStatus, NotificationEvent, TaskKey, TransitionEvent,
};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

struct EngineCounters {
    poll_cycles: AtomicU64,
    transitions_emitted: AtomicU64,
    consecutive_poll_failures: AtomicU64,
    last_poll_at: Mutex<Option<DateTime<Utc>>>,
}

type CatalogCache = tokio::sync::RwLock<Option<(Instant, Arc<Vec<CatalogPlan>>)>>;

/// The assembled monitoring engine; one per process
pub struct MonitorEngine {
    pool: SqlitePool,
    provider: Arc<dyn ProviderApi>,
    pub index: AvailabilityIndex,
    pub subscriptions: SubscriptionRegistry,
    pub queue: AcquisitionQueue,
    pub locks: KeyLockTable,
    pub limiter: RateLimiter,
    pub notifier: Notifier,
    pub interval: PollInterval,
    retry: RetryPolicy,
    running: AtomicBool,
    counters: EngineCounters,
    catalog_cache: CatalogCache,
    catalog_ttl: Duration,
}

impl MonitorEngine {
    pub fn new(
        config: &Config,
        pool: SqlitePool,
        provider: Arc<dyn ProviderApi>,
        notifier: Notifier,
    ) -> Self {
        Self {
            queue: AcquisitionQueue::new(pool.clone()),
            subscriptions: SubscriptionRegistry::new(pool.clone()),
            pool,
            provider,
            index: AvailabilityIndex::new(),
            locks: KeyLockTable::new(),
            limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst),
            notifier,
            interval: PollInterval::new(config.poll_interval_secs),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                initial_delay_ms: config.retry_initial_delay_ms,
                max_delay_ms: config.retry_max_delay_ms,
            },
            running: AtomicBool::new(false),
            counters: EngineCounters {
                poll_cycles: AtomicU64::new(0),
                transitions_emitted: AtomicU64::new(0),
                consecutive_poll_failures: AtomicU64::new(0),
                last_poll_at: Mutex::new(None),
            },
            catalog_cache: tokio::sync::RwLock::new(None),
            catalog_ttl: Duration::from_secs(config.catalog_cache_ttl_secs),
        }
    }

    /// Startup recovery: fail interrupted attempts, reload queue and
    /// subscriptions, auto-start when watches exist
    pub async fn warmup(&self) -> RepoResult<()> {
        let interrupted = repository::task::fail_interrupted(&self.pool).await?;
        if interrupted > 0 {
            tracing::warn!(
                count = interrupted,
                "Tasks interrupted mid-attempt marked failed (outcome unknown)"
            );
        }
        let restored = self.queue.restore().await?;
        let subs = self.subscriptions.reload().await?;
        tracing::info!(queued = restored, subscriptions = subs, "Engine state restored");

        if subs > 0 {
            self.start();
        }
        Ok(())
    }

    // ===== 控制面 =====

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::Relaxed) {
            tracing::info!(interval_secs = self.interval.get(), "Monitor started");
        }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            tracing::info!("Monitor stopped");
        }
    }

    /// Adjust the poll interval; returns the effective (clamped) value
    pub fn set_interval(&self, secs: u64) -> u64 {
        let effective = self.interval.set(secs);
        tracing::info!(interval_secs = effective, "Poll interval updated");
        effective
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            running: self.is_running(),
            poll_interval_secs: self.interval.get(),
            subscription_count: self.subscriptions.count(),
            known_pairs: self.index.len(),
            last_poll_at: self.last_poll_at(),
            consecutive_poll_failures: self.counters.consecutive_poll_failures.load(Ordering::Relaxed),
        }
    }

    pub async fn stats(&self) -> RepoResult<EngineStats> {
        use shared::models::TaskState;
        let queued = repository::task::count_by_state(&self.pool, TaskState::Queued).await?;
        let attempting = repository::task::count_by_state(&self.pool, TaskState::Attempting).await?;
        Ok(EngineStats {
            poll_cycles: self.counters.poll_cycles.load(Ordering::Relaxed),
            transitions_emitted: self.counters.transitions_emitted.load(Ordering::Relaxed),
            active_queues: queued + attempting,
            purchase_success: repository::task::count_by_state(&self.pool, TaskState::Succeeded)
                .await?,
            purchase_failed: repository::task::count_by_state(&self.pool, TaskState::Failed).await?,
            total_skus: self.index.sku_count(),
            available_pairs: self.index.available_pairs(),
        })
    }

    pub fn send_test_notification(&self) {
        self.notifier.send(NotificationEvent::Test);
    }

    fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        match self.counters.last_poll_at.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    // ===== 轮询 =====

    /// One poll cycle: fetch, swap, diff, fan out. No-op while stopped.
    pub async fn poll_once(&self, cancel: &CancellationToken) {
        if !self.is_running() {
            return;
        }
        if !self.limiter.acquire(1.0, cancel).await {
            return;
        }

        let snapshot = match fetcher::fetch_snapshot(self.provider.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Stale snapshot stays in place; a missed poll must not
                // fabricate unavailable→available flips on recovery.
                let failures = self
                    .counters
                    .consecutive_poll_failures
                    .fetch_add(1, Ordering::Relaxed)
                    + 1;
                if failures >= 3 {
                    tracing::error!(error = %e, consecutive_failures = failures, "Availability poll failing repeatedly");
                } else {
                    tracing::warn!(error = %e, consecutive_failures = failures, "Availability poll failed");
                }
                return;
            }
        };

        let previous = self.index.swap(snapshot);
        let current = self.index.load();
        let events = diff_snapshots(&previous, &current);

        self.counters.poll_cycles.fetch_add(1, Ordering::Relaxed);
        self.counters
            .consecutive_poll_failures
            .store(0, Ordering::Relaxed);
        self.counters
            .transitions_emitted
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        if let Ok(mut guard) = self.counters.last_poll_at.lock() {
            *guard = Some(Utc::now());
        }

        tracing::debug!(
            pairs = current.len(),
            transitions = events.len(),
            "Poll cycle completed"
        );
        for event in events {
            self.handle_transition(event).await;
        }
    }

    async fn handle_transition(&self, event: TransitionEvent) {
        let watchers = self.subscriptions.matching(&event);
        if watchers.is_empty() {
            return;
        }
        tracing::info!(
            sku = %event.sku_code,
            facility = %event.facility_code,
            from = ?event.from,
            to = ?event.to,
            watchers = watchers.len(),
            "Availability transition"
        );
        if let Err(e) = self.subscriptions.record_matches(&watchers).await {
            tracing::warn!(error = %e, "Failed to record subscription matches");
        }

        let wants_notify = if event.became_available() {
            watchers.iter().any(|s| s.notify_on_available)
        } else {
            watchers.iter().any(|s| s.notify_on_unavailable)
        };
        if wants_notify {
            self.notifier.send(NotificationEvent::from_transition(&event));
        }

        if event.became_available() && watchers.iter().any(|s| s.auto_order) {
            let key = TaskKey::new(event.sku_code.clone(), event.facility_code.clone(), vec![]);
            match self.queue.enqueue(&key).await {
                Ok(EnqueueReceipt { accepted: false, task_id }) => {
                    tracing::debug!(task_id, key = %key, "Auto-order merged into active task");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Auto-order enqueue failed");
                }
            }
        }
    }

    // ===== 队列操作 =====

    pub async fn enqueue(&self, key: &TaskKey) -> RepoResult<EnqueueReceipt> {
        self.queue.enqueue(key).await
    }

    /// Cancel a queued task; false when it was not in `queued`
    pub async fn cancel_task(&self, task_id: i64) -> RepoResult<bool> {
        let canceled = repository::task::cancel(&self.pool, task_id).await?;
        if canceled {
            self.queue.remove(task_id).await;
            tracing::info!(task_id, "Task canceled");
        }
        Ok(canceled)
    }

    /// Worker context shared by the order worker pool
    pub fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            pool: self.pool.clone(),
            provider: Arc::clone(&self.provider),
            queue: self.queue.clone(),
            locks: self.locks.clone(),
            limiter: self.limiter.clone(),
            notifier: self.notifier.clone(),
            retry: self.retry,
        }
    }

    // ===== 目录缓存 =====

    /// Catalog listing with TTL cache; `force_refresh` bypasses it
    pub async fn catalog(
        &self,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> ProviderResult<Arc<Vec<CatalogPlan>>> {
        if !force_refresh {
            let cache = self.catalog_cache.read().await;
            if let Some((fetched_at, plans)) = cache.as_ref() {
                if fetched_at.elapsed() < self.catalog_ttl {
                    return Ok(Arc::clone(plans));
                }
            }
        }

        if !self.limiter.acquire(1.0, cancel).await {
            // Shutdown mid-request; serve stale if we have it
            let cache = self.catalog_cache.read().await;
            if let Some((_, plans)) = cache.as_ref() {
                return Ok(Arc::clone(plans));
            }
            return Err(provider_client::ProviderError::Timeout);
        }

        match self.provider.list_catalog().await {
            Ok(plans) => {
                let plans = Arc::new(plans);
                *self.catalog_cache.write().await = Some((Instant::now(), Arc::clone(&plans)));
                tracing::debug!(plans = plans.len(), "Catalog cache refreshed");
                Ok(plans)
            }
            Err(e) => {
                let cache = self.catalog_cache.read().await;
                if let Some((_, plans)) = cache.as_ref() {
                    tracing::warn!(error = %e, "Catalog refresh failed, serving cached copy");
                    return Ok(Arc::clone(plans));
                }
                Err(e)
            }
        }
    }

    /// Periodic cache warm; failures are logged and retried next cycle
    pub async fn refresh_catalog(&self, cancel: &CancellationToken) {
        if let Err(e) = self.catalog(true, cancel).await {
            tracing::warn!(error = %e, "Periodic catalog refresh failed");
        }
    }

    /// Live availability listing for one SKU, rate-limited
    pub async fn sku_availability(
        &self,
        sku: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<provider_client::SkuAvailability>> {
        if !self.limiter.acquire(1.0, cancel).await {
            return Err(provider_client::ProviderError::Timeout);
        }
        self.provider.availabilities(Some(sku)).await
    }

    /// Price lookup passthrough, rate-limited
    pub async fn price(
        &self,
        sku: &str,
        facility: &str,
        options: &[String],
        cancel: &CancellationToken,
    ) -> ProviderResult<provider_client::PriceQuote> {
        if !self.limiter.acquire(1.0, cancel).await {
            return Err(provider_client::ProviderError::Timeout);
        }
        self.provider.price(sku, facility, options).await
    }

    pub fn provider(&self) -> &dyn ProviderApi {
        self.provider.as_ref()
    }
}
