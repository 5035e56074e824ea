//! Engine control handlers

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use shared::models::MonitorStatus;

use crate::core::ServerState;
use crate::utils::{ok_with_message, AppResponse, AppResult};

/// POST /api/monitor/start - 启动轮询
pub async fn start(State(state): State<ServerState>) -> AppResult<Json<AppResponse<MonitorStatus>>> {
    state.engine.start();
    Ok(ok_with_message(state.engine.status(), "Monitor started"))
}

/// POST /api/monitor/stop - 停止轮询
///
/// 只停轮询；已入队的任务继续被 worker 处理。
pub async fn stop(State(state): State<ServerState>) -> AppResult<Json<AppResponse<MonitorStatus>>> {
    state.engine.stop();
    Ok(ok_with_message(state.engine.status(), "Monitor stopped"))
}

/// GET /api/monitor/status - 引擎状态
pub async fn status(State(state): State<ServerState>) -> Json<MonitorStatus> {
    Json(state.engine.status())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRequest {
    pub interval_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalResponse {
    /// 实际生效值（低于下限时被钳到下限）
    pub effective_interval_secs: u64,
}

/// PUT /api/monitor/interval - 调节轮询间隔
pub async fn set_interval(
    State(state): State<ServerState>,
    Json(payload): Json<IntervalRequest>,
) -> AppResult<Json<AppResponse<IntervalResponse>>> {
    let effective = state.engine.set_interval(payload.interval_secs);
    Ok(ok_with_message(
        IntervalResponse {
            effective_interval_secs: effective,
        },
        "Poll interval updated",
    ))
}

/// POST /api/monitor/test-notification - 测试通知配置
pub async fn test_notification(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<()>>> {
    state.engine.send_test_notification();
    Ok(ok_with_message((), "Test notification dispatched"))
}
