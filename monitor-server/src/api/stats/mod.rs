//! 统计 API
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/stats | GET | 引擎计数器 |

use axum::{extract::State, routing::get, Json, Router};
use shared::models::EngineStats;

use crate::core::ServerState;
use crate::utils::AppResult;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/stats", get(stats))
}

/// GET /api/stats - 引擎计数器
pub async fn stats(State(state): State<ServerState>) -> AppResult<Json<EngineStats>> {
    Ok(Json(state.engine.stats().await?))
}
