//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查（公共路由）
//! - [`servers`] - 目录与价格查询
//! - [`availability`] - 单 SKU 实时可用性
//! - [`queue`] - 抢购队列管理
//! - [`subscriptions`] - 订阅管理
//! - [`monitor`] - 引擎控制面
//! - [`stats`] - 统计计数器

pub mod middleware;

pub mod availability;
pub mod health;
pub mod monitor;
pub mod queue;
pub mod servers;
pub mod stats;
pub mod subscriptions;

use axum::middleware as axum_middleware;
use axum::Router;
use http::{HeaderName, HeaderValue};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Catalog / price
        .merge(servers::router())
        // Live availability
        .merge(availability::router())
        // Acquisition queue
        .merge(queue::router())
        // Subscriptions + engine control
        .merge(subscriptions::router())
        .merge(monitor::router())
        .merge(stats::router())
        // Health API - public route
        .merge(health::router())
}

/// Build a fully configured application with all middleware and state
pub fn build_app(state: &ServerState) -> Router<ServerState> {
    build_router()
        // ========== Tower HTTP Middleware ==========
        // CORS - Handle cross-origin requests
        .layer(CorsLayer::permissive())
        // Compression - Gzip compress responses
        .layer(CompressionLayer::new())
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        // Request ID - Generate unique ID for each request
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        // Propagate request ID to response
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        // ========== Application Middleware ==========
        // Static API key check - executes before routes
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ))
}
