//! 服务器目录与价格 API
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/servers | GET | 目录列表（TTL 缓存） |
//! | /api/servers/{sku}/price | POST | 价格查询 |

mod handler;

use axum::{routing::get, routing::post, Router};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/servers", get(handler::list))
        .route("/api/servers/{sku}/price", post(handler::price))
}
