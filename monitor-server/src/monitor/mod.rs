//! 监控引擎
//!
//! 轮询 Provider 可用性、检测状态转换、驱动抢购队列。
//!
//! 模块分工：
//!
//! - [`index`] - 上一次快照的内存索引（copy-on-write）
//! - [`diff`] - 快照对比，产出转换事件
//! - [`fetcher`] - 从 Provider 拉取全量快照
//! - [`subscriptions`] - 订阅注册表（内存缓存 + SQLite 持久化）
//! - [`queue`] - 持久化 FIFO 抢购队列
//! - [`keylock`] - 按任务键的单飞锁
//! - [`ratelimit`] - 全局令牌桶
//! - [`worker`] - 订单 worker（重试、退避）
//! - [`notify`] - 通知分发（Telegram）
//! - [`scheduler`] - 轮询调度
//! - [`engine`] - 组装以上全部

pub mod diff;
pub mod engine;
pub mod fetcher;
pub mod index;
pub mod keylock;
pub mod notify;
pub mod queue;
pub mod ratelimit;
pub mod scheduler;
pub mod subscriptions;
pub mod worker;

pub use engine::MonitorEngine;
