//! Acquisition queue handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use shared::models::{AcquisitionTask, EnqueueReceipt, OrderAttempt, TaskCreate, TaskKey, TaskState};

use crate::core::ServerState;
use crate::db::repository::{attempt, task};
use crate::utils::{ok_with_message, AppError, AppResponse, AppResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// 仅返回非终态任务
    #[serde(default)]
    active: bool,
}

/// GET /api/queue - 任务列表（新的在前）
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<AcquisitionTask>>> {
    let tasks = task::find_all(&state.db.pool, query.active).await?;
    Ok(Json(tasks))
}

/// POST /api/queue - 手动入队
///
/// 相同键的活跃任务存在时返回该任务（accepted = false），不报错。
pub async fn enqueue(
    State(state): State<ServerState>,
    Json(payload): Json<TaskCreate>,
) -> AppResult<Json<AppResponse<EnqueueReceipt>>> {
    if payload.sku_code.trim().is_empty() {
        return Err(AppError::Validation("skuCode is required".into()));
    }
    if payload.facility.trim().is_empty() {
        return Err(AppError::Validation("facility is required".into()));
    }

    let key = TaskKey::new(payload.sku_code, payload.facility, payload.options);
    let receipt = state.engine.enqueue(&key).await?;
    let message = if receipt.accepted {
        "Task enqueued"
    } else {
        "Task already active for this key"
    };
    Ok(ok_with_message(receipt, message))
}

/// GET /api/queue/:id - 单任务详情
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AcquisitionTask>> {
    let t = task::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;
    Ok(Json(t))
}

/// DELETE /api/queue/:id - 取消任务
///
/// 只允许取消 `queued` 状态；其余状态返回 409。任务行保留作审计。
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<AcquisitionTask>>> {
    let existing = task::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;

    if existing.state != TaskState::Queued {
        return Err(AppError::Conflict(format!(
            "Task {} is {}, only queued tasks can be canceled",
            id, existing.state
        )));
    }
    if !state.engine.cancel_task(id).await? {
        // Lost the race to a worker between the read and the update
        return Err(AppError::Conflict(format!(
            "Task {} left the queue before it could be canceled",
            id
        )));
    }

    let t = task::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;
    Ok(ok_with_message(t, "Task canceled"))
}

/// GET /api/queue/:id/attempts - 下单审计记录
pub async fn attempts(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<OrderAttempt>>> {
    // 404 for unknown tasks, empty list for tasks never attempted
    task::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;
    let rows = attempt::find_by_task(&state.db.pool, id).await?;
    Ok(Json(rows))
}
