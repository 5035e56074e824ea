use std::path::PathBuf;

use provider_client::{ProviderConfig, Region};

/// 服务器配置 - 监控引擎与 HTTP 服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录（数据库、日志） |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | API_KEY | (无) | 静态 API Key；未设置时跳过鉴权 |
/// | PROVIDER_REGION | eu | Provider API 区域 (eu/ca/us) |
/// | PROVIDER_ENDPOINT | (区域默认) | Provider API base URL 覆盖 |
/// | PROVIDER_APP_KEY | (无) | Provider 应用密钥 |
/// | PROVIDER_APP_SECRET | (无) | Provider 应用机密 |
/// | PROVIDER_CONSUMER_KEY | (无) | Provider 消费者密钥 |
/// | POLL_INTERVAL_SECS | 60 | 可用性轮询间隔（下限 10 秒） |
/// | WORKER_COUNT | 3 | 订单 worker 数量 |
/// | RATE_LIMIT_PER_SEC | 5.0 | 全局令牌桶速率 |
/// | RATE_LIMIT_BURST | 10.0 | 全局令牌桶突发容量 |
/// | MAX_RETRIES | 5 | 单任务最大尝试次数 |
/// | RETRY_INITIAL_DELAY_MS | 2000 | 重试退避初始延迟 |
/// | RETRY_MAX_DELAY_MS | 60000 | 重试退避上限 |
/// | REQUEST_TIMEOUT_MS | 30000 | Provider 请求超时 |
/// | CATALOG_CACHE_TTL_SECS | 7200 | 服务器目录缓存时长 |
/// | TG_BOT_TOKEN | (无) | Telegram Bot Token |
/// | TG_CHAT_ID | (无) | Telegram Chat ID |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/monitor HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库与日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 静态 API Key（未设置时所有请求放行，仅限开发环境）
    pub api_key: Option<String>,

    // === Provider 凭据 ===
    pub provider_region: Region,
    pub provider_endpoint: Option<String>,
    pub provider_app_key: String,
    pub provider_app_secret: String,
    pub provider_consumer_key: String,

    // === 引擎参数 ===
    /// 可用性轮询间隔（秒），必须远大于 Provider 限流窗口
    pub poll_interval_secs: u64,
    /// 订单 worker 数量，不得超过 Provider 容忍的并发连接数
    pub worker_count: usize,
    /// 全局令牌桶速率（每秒令牌数）
    pub rate_limit_per_sec: f64,
    /// 全局令牌桶突发容量
    pub rate_limit_burst: f64,
    /// 单任务最大尝试次数
    pub max_retries: u32,
    /// 重试退避初始延迟（毫秒）
    pub retry_initial_delay_ms: u64,
    /// 重试退避上限（毫秒）
    pub retry_max_delay_ms: u64,
    /// Provider 请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 服务器目录缓存时长（秒）
    pub catalog_cache_ttl_secs: u64,

    // === 通知渠道 ===
    pub tg_bot_token: Option<String>,
    pub tg_chat_id: Option<String>,
}

/// 轮询间隔下限：抓取全量快照本身要消耗配额
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),

            provider_region: Region::from_str_lossy(
                &std::env::var("PROVIDER_REGION").unwrap_or_else(|_| "eu".into()),
            ),
            provider_endpoint: std::env::var("PROVIDER_ENDPOINT")
                .ok()
                .filter(|e| !e.is_empty()),
            provider_app_key: std::env::var("PROVIDER_APP_KEY").unwrap_or_default(),
            provider_app_secret: std::env::var("PROVIDER_APP_SECRET").unwrap_or_default(),
            provider_consumer_key: std::env::var("PROVIDER_CONSUMER_KEY").unwrap_or_default(),

            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", 60).max(MIN_POLL_INTERVAL_SECS),
            worker_count: env_parse("WORKER_COUNT", 3),
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", 5.0),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", 10.0),
            max_retries: env_parse("MAX_RETRIES", 5),
            retry_initial_delay_ms: env_parse("RETRY_INITIAL_DELAY_MS", 2000),
            retry_max_delay_ms: env_parse("RETRY_MAX_DELAY_MS", 60_000),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30_000),
            catalog_cache_ttl_secs: env_parse("CATALOG_CACHE_TTL_SECS", 7200),

            tg_bot_token: std::env::var("TG_BOT_TOKEN").ok().filter(|t| !t.is_empty()),
            tg_chat_id: std::env::var("TG_CHAT_ID").ok().filter(|c| !c.is_empty()),
        }
    }

    /// Provider 客户端配置
    pub fn provider(&self) -> ProviderConfig {
        ProviderConfig {
            region: self.provider_region,
            endpoint: self.provider_endpoint.clone(),
            app_key: self.provider_app_key.clone(),
            app_secret: self.provider_app_secret.clone(),
            consumer_key: self.provider_consumer_key.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }

    /// 数据库目录 (work_dir/database)
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// 日志目录 (work_dir/logs)
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
