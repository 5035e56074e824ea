use std::sync::Arc;

use provider_client::HttpProviderClient;
use tokio_util::sync::CancellationToken;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::Config;
use crate::db::DbService;
use crate::monitor::notify::{self, TelegramConfig};
use crate::monitor::{scheduler, worker, MonitorEngine};

/// 服务器状态 - 持有所有服务的单例引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | DbService | SQLite 连接池 |
/// | engine | Arc<MonitorEngine> | 监控引擎 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 数据库服务
    pub db: DbService,
    /// 监控引擎
    pub engine: Arc<MonitorEngine>,
}

impl ServerState {
    /// 初始化服务器状态并注册后台任务
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/monitor.db)
    /// 3. Provider 客户端
    /// 4. 通知分发、监控引擎
    /// 5. 引擎热身（故障恢复、队列重载、按需自启）
    ///
    /// # Panics
    ///
    /// 数据库或目录初始化失败时 panic
    pub async fn initialize(config: &Config) -> (Self, BackgroundTasks) {
        // 0. Ensure work_dir structure exists
        config
            .ensure_work_dir_structure()
            .expect("Failed to create work directory structure");

        // 1. Initialize DB
        let db_path = config.database_dir().join("monitor.db");
        let db = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        // 2. Provider client
        let provider_config = config.provider();
        if !provider_config.is_configured() {
            tracing::warn!(
                "Provider credentials not configured; polling and ordering will fail until set"
            );
        }
        let provider = Arc::new(
            HttpProviderClient::new(provider_config).expect("Failed to build provider client"),
        );

        // 3. Notification channel + engine
        let mut tasks = BackgroundTasks::new();
        let cancel = tasks.shutdown_token();

        let telegram = match (&config.tg_bot_token, &config.tg_chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token: bot_token.clone(),
                chat_id: chat_id.clone(),
            }),
            _ => {
                tracing::info!("Telegram not configured, notifications are log-only");
                None
            }
        };
        let (notifier, dispatcher) = notify::channel(telegram, cancel.clone());
        tasks.spawn("notify_dispatcher", TaskKind::Worker, dispatcher);

        let engine = Arc::new(MonitorEngine::new(config, db.pool.clone(), provider, notifier));

        // 4. Recovery: interrupted attempts, queue reload, auto-start
        engine
            .warmup()
            .await
            .expect("Failed to restore engine state from database");

        let state = Self {
            config: config.clone(),
            db,
            engine: Arc::clone(&engine),
        };
        state.register_background_tasks(&mut tasks, engine, cancel);

        (state, tasks)
    }

    /// 注册引擎后台任务：订单 worker 池、轮询、目录缓存刷新
    fn register_background_tasks(
        &self,
        tasks: &mut BackgroundTasks,
        engine: Arc<MonitorEngine>,
        cancel: CancellationToken,
    ) {
        // Order worker pool
        let ctx = engine.worker_context();
        for worker_id in 0..self.config.worker_count {
            // Worker count is fixed for the process lifetime; leaking the
            // name keeps BackgroundTasks on &'static str
            let name: &'static str =
                Box::leak(format!("order_worker_{worker_id}").into_boxed_str());
            tasks.spawn(
                name,
                TaskKind::Worker,
                worker::run(ctx.clone(), worker_id, cancel.clone()),
            );
        }

        // Availability poll loop
        {
            let engine = Arc::clone(&engine);
            let interval = engine.interval.clone();
            let cancel = cancel.clone();
            tasks.spawn("availability_poll", TaskKind::Periodic, async move {
                let tick_cancel = cancel.clone();
                scheduler::run_periodic("availability_poll", interval, cancel, move || {
                    let engine = Arc::clone(&engine);
                    let cancel = tick_cancel.clone();
                    async move { engine.poll_once(&cancel).await }
                })
                .await;
            });
        }

        // Catalog cache refresh
        {
            let engine = Arc::clone(&engine);
            let interval = scheduler::PollInterval::new(self.config.catalog_cache_ttl_secs);
            tasks.spawn("catalog_refresh", TaskKind::Periodic, async move {
                let tick_cancel = cancel.clone();
                scheduler::run_periodic("catalog_refresh", interval, cancel, move || {
                    let engine = Arc::clone(&engine);
                    let cancel = tick_cancel.clone();
                    async move { engine.refresh_catalog(&cancel).await }
                })
                .await;
            });
        }

        tasks.log_summary();
    }
}
