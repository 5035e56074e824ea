//! End-to-end engine tests over a temporary SQLite database: poll → diff →
//! enqueue → worker → attempt audit, with a scripted fake provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use monitor_server::core::Config;
use chrono::Utc;
use monitor_server::db::repository::attempt as attempt_repo;
use monitor_server::db::repository::attempt::AttemptRecord;
use monitor_server::db::repository::task as task_repo;
use monitor_server::db::DbService;
use monitor_server::monitor::{notify, worker, MonitorEngine};
use provider_client::{
    CatalogPlan, FacilityAvailability, OrderReceipt, PriceQuote, ProviderApi, ProviderError,
    ProviderResult, Region, SkuAvailability,
};
use shared::models::{AttemptOutcome, SubscriptionCreate, TaskKey, TaskState};
use tokio_util::sync::CancellationToken;

/// Scripted provider: availability polls and order outcomes are dequeued
/// in order; the last availability script entry repeats once exhausted.
struct FakeProvider {
    availability_script: Mutex<VecDeque<Vec<SkuAvailability>>>,
    order_script: Mutex<VecDeque<ProviderResult<OrderReceipt>>>,
    order_calls: AtomicUsize,
    order_times: Mutex<Vec<Instant>>,
}

impl FakeProvider {
    fn new() -> Self {
        Self {
            availability_script: Mutex::new(VecDeque::new()),
            order_script: Mutex::new(VecDeque::new()),
            order_calls: AtomicUsize::new(0),
            order_times: Mutex::new(Vec::new()),
        }
    }

    fn push_availability(&self, sku: &str, facility: &str, raw: &str) {
        self.availability_script
            .lock()
            .unwrap()
            .push_back(vec![SkuAvailability {
                plan_code: sku.into(),
                fqn: None,
                memory: None,
                storage: None,
                datacenters: vec![FacilityAvailability {
                    datacenter: facility.into(),
                    availability: raw.into(),
                }],
            }]);
    }

    fn push_order(&self, outcome: ProviderResult<OrderReceipt>) {
        self.order_script.lock().unwrap().push_back(outcome);
    }

    fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    fn order_times(&self) -> Vec<Instant> {
        self.order_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderApi for FakeProvider {
    async fn list_catalog(&self) -> ProviderResult<Vec<CatalogPlan>> {
        Ok(vec![CatalogPlan {
            plan_code: "25skle01".into(),
            name: "KS-LE-1".into(),
            cpu: None,
            memory: None,
            storage: None,
            bandwidth: None,
        }])
    }

    async fn availabilities(&self, _sku: Option<&str>) -> ProviderResult<Vec<SkuAvailability>> {
        let mut script = self.availability_script.lock().unwrap();
        if script.len() > 1 {
            Ok(script.pop_front().unwrap_or_default())
        } else {
            Ok(script.front().cloned().unwrap_or_default())
        }
    }

    async fn price(
        &self,
        _sku: &str,
        _facility: &str,
        _options: &[String],
    ) -> ProviderResult<PriceQuote> {
        Err(ProviderError::Server(500))
    }

    async fn place_order(
        &self,
        _sku: &str,
        _facility: &str,
        _options: &[String],
    ) -> ProviderResult<OrderReceipt> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        self.order_times.lock().unwrap().push(Instant::now());
        self.order_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::Server(500)))
    }
}

fn test_config(work_dir: &std::path::Path) -> Config {
    Config {
        work_dir: work_dir.to_string_lossy().into_owned(),
        http_port: 0,
        api_key: None,
        provider_region: Region::Eu,
        provider_endpoint: None,
        provider_app_key: String::new(),
        provider_app_secret: String::new(),
        provider_consumer_key: String::new(),
        poll_interval_secs: 10,
        worker_count: 1,
        rate_limit_per_sec: 500.0,
        rate_limit_burst: 500.0,
        max_retries: 5,
        retry_initial_delay_ms: 5,
        retry_max_delay_ms: 20,
        request_timeout_ms: 1000,
        catalog_cache_ttl_secs: 3600,
        tg_bot_token: None,
        tg_chat_id: None,
    }
}

struct Harness {
    engine: Arc<MonitorEngine>,
    provider: Arc<FakeProvider>,
    pool: sqlx::SqlitePool,
    cancel: CancellationToken,
    _dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    harness_with(|_| {}).await
}

async fn harness_with(tweak: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    tweak(&mut config);
    config.ensure_work_dir_structure().unwrap();
    let db_path = config.database_dir().join("monitor.db");
    let db = DbService::new(&db_path.to_string_lossy()).await.unwrap();

    let cancel = CancellationToken::new();
    let (notifier, dispatcher) = notify::channel(None, cancel.clone());
    tokio::spawn(dispatcher);

    let provider = Arc::new(FakeProvider::new());
    let provider_api: Arc<dyn ProviderApi> = provider.clone();
    let engine = Arc::new(MonitorEngine::new(
        &config,
        db.pool.clone(),
        provider_api,
        notifier,
    ));
    Harness {
        engine,
        provider,
        pool: db.pool,
        cancel,
        _dir: dir,
    }
}

async fn wait_for_state(pool: &sqlx::SqlitePool, id: i64, expected: TaskState) {
    for _ in 0..500 {
        if let Some(task) = task_repo::find_by_id(pool, id).await.unwrap() {
            if task.state == expected {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let current = task_repo::find_by_id(pool, id).await.unwrap().map(|t| t.state);
    panic!("task {id} never reached {expected:?}, currently {current:?}");
}

#[tokio::test]
async fn transition_auto_enqueues_exactly_one_task() {
    let h = harness().await;
    h.engine
        .subscriptions
        .add(SubscriptionCreate {
            sku_code: "25skle01".into(),
            facility_codes: vec![],
            notify_on_available: true,
            notify_on_unavailable: false,
            auto_order: true,
        })
        .await
        .unwrap();
    h.engine.start();

    h.provider.push_availability("25skle01", "gra", "unavailable");
    h.provider.push_availability("25skle01", "gra", "1H-low");

    h.engine.poll_once(&h.cancel).await;
    assert!(task_repo::find_all(&h.pool, true).await.unwrap().is_empty());

    h.engine.poll_once(&h.cancel).await;
    let active = task_repo::find_all(&h.pool, true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].sku_code, "25skle01");
    assert_eq!(active[0].facility_code, "gra");

    // Still available on the next poll: no new transition, no second task
    h.engine.poll_once(&h.cancel).await;
    assert_eq!(task_repo::find_all(&h.pool, true).await.unwrap().len(), 1);

    let stats = h.engine.stats().await.unwrap();
    assert_eq!(stats.poll_cycles, 3);
    assert_eq!(stats.transitions_emitted, 1);
}

#[tokio::test]
async fn stopped_monitor_does_not_poll() {
    let h = harness().await;
    h.provider.push_availability("25skle01", "gra", "available");

    h.engine.poll_once(&h.cancel).await;
    assert_eq!(h.engine.stats().await.unwrap().poll_cycles, 0);

    h.engine.start();
    h.engine.poll_once(&h.cancel).await;
    assert_eq!(h.engine.stats().await.unwrap().poll_cycles, 1);
}

#[tokio::test]
async fn throttled_attempts_retry_until_success() {
    let h = harness().await;
    for _ in 0..3 {
        h.provider.push_order(Err(ProviderError::Throttled {
            retry_after_secs: None,
        }));
    }
    h.provider.push_order(Ok(OrderReceipt {
        order_id: "order-42".into(),
        order_url: "https://example.test/order/42".into(),
    }));

    let receipt = h
        .engine
        .enqueue(&TaskKey::new("25skle01", "gra", vec![]))
        .await
        .unwrap();
    assert!(receipt.accepted);

    let worker_handle = tokio::spawn(worker::run(
        h.engine.worker_context(),
        0,
        h.cancel.clone(),
    ));

    wait_for_state(&h.pool, receipt.task_id, TaskState::Succeeded).await;
    let task = task_repo::find_by_id(&h.pool, receipt.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.attempts, 4);
    assert_eq!(task.order_id.as_deref(), Some("order-42"));
    assert_eq!(h.provider.order_calls(), 4);

    let attempts = attempt_repo::find_by_task(&h.pool, receipt.task_id)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 4);
    assert!(attempts[..3].iter().all(|a| a.outcome == "retryable"));
    assert_eq!(attempts[3].outcome, "succeeded");
    assert_eq!(
        attempts.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );

    h.cancel.cancel();
    worker_handle.await.unwrap();
}

#[tokio::test]
async fn rejection_fails_without_retry() {
    let h = harness().await;
    h.provider.push_order(Err(ProviderError::Rejected {
        status: 400,
        code: "INVALID_CONFIGURATION".into(),
        message: "option not orderable".into(),
    }));

    let receipt = h
        .engine
        .enqueue(&TaskKey::new("25skle01", "gra", vec!["bad-option".into()]))
        .await
        .unwrap();
    let worker_handle = tokio::spawn(worker::run(
        h.engine.worker_context(),
        0,
        h.cancel.clone(),
    ));

    wait_for_state(&h.pool, receipt.task_id, TaskState::Failed).await;
    let task = task_repo::find_by_id(&h.pool, receipt.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.attempts, 1);
    assert_eq!(h.provider.order_calls(), 1);

    let attempts = attempt_repo::find_by_task(&h.pool, receipt.task_id)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, "rejected");
    assert_eq!(attempts[0].provider_code.as_deref(), Some("INVALID_CONFIGURATION"));

    h.cancel.cancel();
    worker_handle.await.unwrap();
}

#[tokio::test]
async fn retry_budget_exhaustion_fails_task() {
    let h = harness().await;
    // Script nothing: every order call errors (Server 500, retryable)

    let receipt = h
        .engine
        .enqueue(&TaskKey::new("25skle01", "gra", vec![]))
        .await
        .unwrap();
    let worker_handle = tokio::spawn(worker::run(
        h.engine.worker_context(),
        0,
        h.cancel.clone(),
    ));

    wait_for_state(&h.pool, receipt.task_id, TaskState::Failed).await;
    let task = task_repo::find_by_id(&h.pool, receipt.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.attempts, 5); // max_retries
    assert_eq!(h.provider.order_calls(), 5);

    h.cancel.cancel();
    worker_handle.await.unwrap();
}

#[tokio::test]
async fn concurrent_duplicate_enqueue_merges() {
    let h = harness().await;
    let key = TaskKey::new("25skle01", "gra", vec!["raid-1".into(), "ram-64g".into()]);
    // Same intent with permuted options
    let key_permuted = TaskKey::new("25skle01", "gra", vec!["ram-64g".into(), "raid-1".into()]);

    let (a, b, c) = tokio::join!(
        h.engine.enqueue(&key),
        h.engine.enqueue(&key_permuted),
        h.engine.enqueue(&key),
    );
    let receipts = [a.unwrap(), b.unwrap(), c.unwrap()];

    let accepted = receipts.iter().filter(|r| r.accepted).count();
    assert_eq!(accepted, 1);
    let ids: std::collections::HashSet<i64> = receipts.iter().map(|r| r.task_id).collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(task_repo::find_all(&h.pool, true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn terminal_key_can_be_enqueued_again() {
    let h = harness().await;
    let key = TaskKey::new("25skle01", "gra", vec![]);

    let first = h.engine.enqueue(&key).await.unwrap();
    assert!(h.engine.cancel_task(first.task_id).await.unwrap());

    let second = h.engine.enqueue(&key).await.unwrap();
    assert!(second.accepted);
    assert_ne!(second.task_id, first.task_id);
}

#[tokio::test]
async fn cancel_applies_only_to_queued_tasks() {
    let h = harness().await;
    let receipt = h
        .engine
        .enqueue(&TaskKey::new("25skle01", "gra", vec![]))
        .await
        .unwrap();

    assert!(h.engine.cancel_task(receipt.task_id).await.unwrap());
    let task = task_repo::find_by_id(&h.pool, receipt.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.state, TaskState::Canceled);

    // Terminal rows refuse a second cancel
    assert!(!h.engine.cancel_task(receipt.task_id).await.unwrap());
}

#[tokio::test]
async fn warmup_fails_interrupted_attempts() {
    let h = harness().await;
    let receipt = h
        .engine
        .enqueue(&TaskKey::new("25skle01", "gra", vec![]))
        .await
        .unwrap();
    task_repo::begin_attempt(&h.pool, receipt.task_id)
        .await
        .unwrap()
        .unwrap();

    // Simulated restart: warmup must not requeue an attempt whose
    // provider call outcome is unknown
    h.engine.warmup().await.unwrap();
    let task = task_repo::find_by_id(&h.pool, receipt.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.state, TaskState::Failed);
    assert!(task.last_error.unwrap().contains("interrupted"));
}

#[tokio::test]
async fn subscription_facility_filter_limits_auto_order() {
    let h = harness().await;
    h.engine
        .subscriptions
        .add(SubscriptionCreate {
            sku_code: "25skle01".into(),
            facility_codes: vec!["rbx".into()],
            notify_on_available: true,
            notify_on_unavailable: false,
            auto_order: true,
        })
        .await
        .unwrap();
    h.engine.start();

    // Becomes available in gra, which the subscription does not watch
    h.provider.push_availability("25skle01", "gra", "unavailable");
    h.provider.push_availability("25skle01", "gra", "available");
    h.engine.poll_once(&h.cancel).await;
    h.engine.poll_once(&h.cancel).await;

    assert!(task_repo::find_all(&h.pool, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn transitions_bump_subscription_match_counters() {
    let h = harness().await;
    h.engine
        .subscriptions
        .add(SubscriptionCreate {
            sku_code: "25skle01".into(),
            facility_codes: vec![],
            notify_on_available: true,
            notify_on_unavailable: false,
            auto_order: false,
        })
        .await
        .unwrap();
    h.engine.start();

    h.provider.push_availability("25skle01", "gra", "unavailable");
    h.provider.push_availability("25skle01", "gra", "available");

    h.engine.poll_once(&h.cancel).await;
    assert_eq!(h.engine.subscriptions.list()[0].match_count, 0);

    h.engine.poll_once(&h.cancel).await;
    let sub = h.engine.subscriptions.list()[0].clone();
    assert_eq!(sub.match_count, 1);
    assert!(sub.last_matched_at.is_some());

    // Steady availability: no new transition, counter holds
    h.engine.poll_once(&h.cancel).await;
    assert_eq!(h.engine.subscriptions.list()[0].match_count, 1);
}

#[tokio::test]
async fn clear_removes_every_subscription() {
    let h = harness().await;
    for sku in ["25skle01", "25skle02"] {
        h.engine
            .subscriptions
            .add(SubscriptionCreate {
                sku_code: sku.into(),
                facility_codes: vec![],
                notify_on_available: true,
                notify_on_unavailable: false,
                auto_order: false,
            })
            .await
            .unwrap();
    }
    assert_eq!(h.engine.subscriptions.count(), 2);

    assert_eq!(h.engine.subscriptions.clear().await.unwrap(), 2);
    assert_eq!(h.engine.subscriptions.count(), 0);
    // Durable: nothing comes back on reload
    assert_eq!(h.engine.subscriptions.reload().await.unwrap(), 0);
    assert_eq!(h.engine.subscriptions.clear().await.unwrap(), 0);
}

#[tokio::test]
async fn order_rate_stays_within_token_bucket() {
    // 1 burst token, then one refill every 50ms
    let h = harness_with(|c| {
        c.rate_limit_per_sec = 20.0;
        c.rate_limit_burst = 1.0;
    })
    .await;

    let mut ids = Vec::new();
    for i in 0..5 {
        h.provider.push_order(Ok(OrderReceipt {
            order_id: format!("order-{i}"),
            order_url: String::new(),
        }));
        let receipt = h
            .engine
            .enqueue(&TaskKey::new(format!("sku-{i}"), "gra", vec![]))
            .await
            .unwrap();
        ids.push(receipt.task_id);
    }

    let workers: Vec<_> = (0..3)
        .map(|i| tokio::spawn(worker::run(h.engine.worker_context(), i, h.cancel.clone())))
        .collect();
    for id in &ids {
        wait_for_state(&h.pool, *id, TaskState::Succeeded).await;
    }

    let times = h.provider.order_times();
    assert_eq!(times.len(), 5);
    // 5 orders need 4 refills, so roughly 200ms end to end
    let span = times[4].duration_since(times[0]);
    assert!(span >= Duration::from_millis(150), "orders placed too fast: {span:?}");
    // No 4 consecutive orders squeeze into less than 2 refill periods
    for w in times.windows(4) {
        let window = w[3].duration_since(w[0]);
        assert!(window >= Duration::from_millis(100), "burst exceeded: {window:?}");
    }

    h.cancel.cancel();
    for worker_handle in workers {
        worker_handle.await.unwrap();
    }
}

#[tokio::test]
async fn unpersistable_outcome_fails_task_instead_of_stranding_it() {
    let h = harness().await;
    h.provider.push_order(Ok(OrderReceipt {
        order_id: "order-1".into(),
        order_url: String::new(),
    }));
    let receipt = h
        .engine
        .enqueue(&TaskKey::new("25skle01", "gra", vec![]))
        .await
        .unwrap();

    // Occupy (task, attempt 1) so the worker's audit insert is rejected
    // by the unique constraint after the order call
    attempt_repo::insert(
        &h.pool,
        AttemptRecord {
            task_id: receipt.task_id,
            attempt_number: 1,
            started_at: Utc::now(),
            outcome: AttemptOutcome::Retryable,
            provider_code: None,
            message: None,
        },
    )
    .await
    .unwrap();

    let worker_handle = tokio::spawn(worker::run(
        h.engine.worker_context(),
        0,
        h.cancel.clone(),
    ));

    // The task must land in a terminal state, not sit in `attempting`
    wait_for_state(&h.pool, receipt.task_id, TaskState::Failed).await;
    let task = task_repo::find_by_id(&h.pool, receipt.task_id)
        .await
        .unwrap()
        .unwrap();
    assert!(task.last_error.unwrap().contains("not persisted"));
    assert_eq!(h.provider.order_calls(), 1);

    h.cancel.cancel();
    worker_handle.await.unwrap();
}
