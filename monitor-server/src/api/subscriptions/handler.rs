//! Subscription handlers

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use shared::models::{BatchSummary, Subscription, SubscriptionCreate};
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::utils::{ok_with_message, AppError, AppResponse, AppResult};

/// GET /api/monitor/subscriptions - 订阅列表
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Subscription>>> {
    Ok(Json(state.engine.subscriptions.list().to_vec()))
}

/// POST /api/monitor/subscriptions - 新建订阅
///
/// 第一个订阅会自动启动监控引擎。
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<SubscriptionCreate>,
) -> AppResult<Json<AppResponse<Subscription>>> {
    if payload.sku_code.trim().is_empty() {
        return Err(AppError::Validation("skuCode is required".into()));
    }
    let sub = state.engine.subscriptions.add(payload).await?;
    state.engine.start();
    Ok(ok_with_message(sub, "Subscription created"))
}

/// DELETE /api/monitor/subscriptions/:id - 删除订阅
///
/// 最后一个订阅删除后监控引擎自动停止。
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<()>>> {
    if !state.engine.subscriptions.remove(id).await? {
        return Err(AppError::not_found(format!("Subscription {} not found", id)));
    }
    if state.engine.subscriptions.count() == 0 {
        state.engine.stop();
    }
    Ok(ok_with_message((), "Subscription deleted"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSummary {
    pub removed: u64,
}

/// DELETE /api/monitor/subscriptions/clear - 清空全部订阅
///
/// 返回删除数量；监控引擎随之停止。
pub async fn clear(State(state): State<ServerState>) -> AppResult<Json<AppResponse<ClearSummary>>> {
    let removed = state.engine.subscriptions.clear().await?;
    state.engine.stop();
    Ok(ok_with_message(
        ClearSummary { removed },
        "Subscriptions cleared",
    ))
}

/// POST /api/monitor/subscriptions/batch-add-all - 订阅整个目录
///
/// 已有订阅的 SKU 跳过；幂等，可重复调用。
pub async fn batch_add_all(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<BatchSummary>>> {
    let catalog = state
        .engine
        .catalog(false, &CancellationToken::new())
        .await?;
    let summary = state.engine.subscriptions.batch_add_all(&catalog).await?;
    if summary.added > 0 {
        state.engine.start();
    }
    Ok(ok_with_message(summary, "Batch subscription completed"))
}
