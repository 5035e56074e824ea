//! API Key 鉴权中间件
//!
//! 静态 `X-Api-Key` 校验。未配置 API_KEY 时放行所有请求（开发模式），
//! 健康检查路由始终豁免。

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::core::ServerState;
use crate::utils::AppError;

const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = match &state.config.api_key {
        Some(key) => key,
        None => return Ok(next.run(request).await),
    };

    // Liveness probes carry no credentials
    if request.uri().path().starts_with("/api/health") {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(next.run(request).await)
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Content-independent byte comparison; only the length check short-circuits
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_matches_exact_only() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret1"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
