//! 订阅管理 API
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/monitor/subscriptions | GET | 订阅列表 |
//! | /api/monitor/subscriptions | POST | 新建订阅 |
//! | /api/monitor/subscriptions/{id} | DELETE | 删除订阅 |
//! | /api/monitor/subscriptions/clear | DELETE | 清空全部订阅 |
//! | /api/monitor/subscriptions/batch-add-all | POST | 订阅整个目录 |

mod handler;

use axum::routing::{get, post};
use axum::Router;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route(
            "/api/monitor/subscriptions",
            get(handler::list).post(handler::create),
        )
        .route(
            "/api/monitor/subscriptions/{id}",
            axum::routing::delete(handler::delete),
        )
        .route(
            "/api/monitor/subscriptions/clear",
            axum::routing::delete(handler::clear),
        )
        .route(
            "/api/monitor/subscriptions/batch-add-all",
            post(handler::batch_add_all),
        )
}
