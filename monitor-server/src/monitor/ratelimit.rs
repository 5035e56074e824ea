//! 全局令牌桶
//!
//! 所有 Provider 调用（轮询 + 订单）共享一个桶，保证对外请求速率
//! 恒定有界。`acquire` 在桶空时挂起等待补充，可被取消令牌打断。

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket: `rate` tokens/second, up to `burst` accumulated
#[derive(Clone)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: f64) -> Self {
        let rate = rate.max(0.01);
        let burst = burst.max(1.0);
        Self {
            rate,
            burst,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Take `cost` tokens, sleeping until the bucket refills.
    ///
    /// Returns `false` when `cancel` fires before a token was obtained;
    /// no token is consumed in that case.
    pub async fn acquire(&self, cost: f64, cancel: &CancellationToken) -> bool {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
                bucket.last_refill = now;

                if bucket.tokens >= cost {
                    bucket.tokens -= cost;
                    return true;
                }
                let deficit = cost - bucket.tokens;
                Duration::from_secs_f64(deficit / self.rate)
            };

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
