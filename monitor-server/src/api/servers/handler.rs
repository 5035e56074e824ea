//! Catalog / price handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use provider_client::{CatalogPlan, PriceQuote};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// 绕过目录缓存
    #[serde(default)]
    force_refresh: bool,
    /// 仅返回带 API 可见配置的条目（按 SKU 前缀过滤）
    #[serde(default)]
    show_api_servers: bool,
}

/// GET /api/servers - 目录列表
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<CatalogPlan>>> {
    let plans = state
        .engine
        .catalog(query.force_refresh, &CancellationToken::new())
        .await
        .map_err(AppError::from)?;

    let plans: Vec<CatalogPlan> = if query.show_api_servers {
        plans.iter().cloned().collect()
    } else {
        // Hide internal/API-only plan codes from the default listing
        plans
            .iter()
            .filter(|p| !p.plan_code.starts_with("api-"))
            .cloned()
            .collect()
    };
    Ok(Json(plans))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub facility: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// POST /api/servers/{sku}/price - 价格查询
pub async fn price(
    State(state): State<ServerState>,
    Path(sku): Path<String>,
    Json(payload): Json<PriceRequest>,
) -> AppResult<Json<PriceQuote>> {
    if payload.facility.is_empty() {
        return Err(AppError::Validation("facility is required".into()));
    }
    let quote = state
        .engine
        .price(
            &sku,
            &payload.facility,
            &payload.options,
            &CancellationToken::new(),
        )
        .await?;
    Ok(Json(quote))
}
