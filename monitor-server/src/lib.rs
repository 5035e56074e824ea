//! Inventory Monitor Server - 库存监控与抢购服务
//!
//! # 架构概述
//!
//! 本模块是监控服务的主入口，提供以下核心功能：
//!
//! - **监控引擎** (`monitor`): 轮询 Provider 可用性、检测转换、驱动抢购
//! - **数据库** (`db`): SQLite (WAL) 持久化订阅、任务与下单审计
//! - **HTTP API** (`api`): 队列、订阅、引擎控制的 RESTful 接口
//!
//! # 模块结构
//!
//! ```text
//! monitor-server/src/
//! ├── core/          # 配置、状态、后台任务、HTTP 服务器
//! ├── monitor/       # 引擎：索引、差分、队列、worker、通知
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 数据库层与仓储
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod monitor;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use monitor::MonitorEngine;
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境：dotenv、工作目录、日志
///
/// 返回加载好的配置；必须在任何 tracing 调用之前执行。
pub fn setup_environment() -> Result<Config, Box<dyn std::error::Error>> {
    // .env is optional; real deployments use process env vars
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    config.ensure_work_dir_structure()?;

    let log_dir = config.log_dir();
    let log_level = std::env::var("LOG_LEVEL").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.to_str());

    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    __  ___            _ __
   /  |/  /___  ____  (_) /_____  _____
  / /|_/ / __ \/ __ \/ / __/ __ \/ ___/
 / /  / / /_/ / / / / / /_/ /_/ / /
/_/  /_/\____/_/ /_/_/\__/\____/_/
    "#
    );
}
