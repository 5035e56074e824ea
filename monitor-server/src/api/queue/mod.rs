//! 抢购队列 API
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/queue | GET | 任务列表 |
//! | /api/queue | POST | 手动入队（幂等去重） |
//! | /api/queue/{id} | GET | 单任务详情 |
//! | /api/queue/{id} | DELETE | 取消排队中的任务 |
//! | /api/queue/{id}/attempts | GET | 任务的下单审计记录 |

mod handler;

use axum::routing::get;
use axum::Router;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/queue", get(handler::list).post(handler::enqueue))
        .route(
            "/api/queue/{id}",
            get(handler::get_by_id).delete(handler::cancel),
        )
        .route("/api/queue/{id}/attempts", get(handler::attempts))
}
