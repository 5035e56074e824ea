//! 实时可用性 API
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/availability/{sku} | GET | 单 SKU 实时可用性（可按配置过滤） |

mod handler;

pub use handler::listing_matches_options;

use axum::{routing::get, Router};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/availability/{sku}", get(handler::by_sku))
}
