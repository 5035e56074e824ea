//! 监控引擎控制面 API
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/monitor/start | POST | 启动轮询 |
//! | /api/monitor/stop | POST | 停止轮询 |
//! | /api/monitor/status | GET | 引擎状态 |
//! | /api/monitor/interval | PUT | 调节轮询间隔（下限 10 秒） |
//! | /api/monitor/test-notification | POST | 发送测试通知 |

mod handler;

use axum::routing::{get, post, put};
use axum::Router;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/monitor/start", post(handler::start))
        .route("/api/monitor/stop", post(handler::stop))
        .route("/api/monitor/status", get(handler::status))
        .route("/api/monitor/interval", put(handler::set_interval))
        .route(
            "/api/monitor/test-notification",
            post(handler::test_notification),
        )
}
