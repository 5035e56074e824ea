//! 订单 worker
//!
//! 从队列取任务，按键加单飞锁，经全局令牌桶限速后调用 Provider 下单。
//! 可重试失败走指数退避回队尾，Provider 拒绝立即终结任务。每次真实
//! 下单调用都写一条 attempt 审计记录。

use super::keylock::KeyLockTable;
use super::notify::Notifier;
use super::queue::AcquisitionQueue;
use super::ratelimit::RateLimiter;
use crate::db::repository::{self, attempt::AttemptRecord, RepoResult};
use chrono::Utc;
use provider_client::{ProviderApi, ProviderError};
use rand::Rng;
use shared::models::{AttemptOutcome, NotificationEvent, TaskState};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long a worker parks after losing the per-key lock race
const LOCK_CONTENTION_DELAY: Duration = Duration::from_millis(500);
/// Idle poll cadence when the queue is empty and no wakeup arrives
const IDLE_WAIT: Duration = Duration::from_secs(5);

/// Exponential backoff with full jitter
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`; `attempt` starts at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let base = self
            .initial_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        // Full jitter keeps concurrent retries from re-colliding
        let jittered = rand::thread_rng().gen_range(base / 2..=base.max(1));
        Duration::from_millis(jittered)
    }

    pub fn budget_exhausted(&self, attempt_number: i64) -> bool {
        attempt_number >= self.max_retries as i64
    }
}

/// Shared state handed to every worker
#[derive(Clone)]
pub struct WorkerContext {
    pub pool: SqlitePool,
    pub provider: Arc<dyn ProviderApi>,
    pub queue: AcquisitionQueue,
    pub locks: KeyLockTable,
    pub limiter: RateLimiter,
    pub notifier: Notifier,
    pub retry: RetryPolicy,
}

/// Worker main loop; runs until the cancellation token fires
pub async fn run(ctx: WorkerContext, worker_id: usize, cancel: CancellationToken) {
    tracing::info!(worker_id, "Order worker started");
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let (task_id, wait) = ctx.queue.next_ready().await;
        match task_id {
            Some(task_id) => {
                if let Err(e) = process_task(&ctx, worker_id, task_id, &cancel).await {
                    tracing::error!(worker_id, task_id, error = %e, "Task processing failed");
                }
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ctx.queue.wait_for_work(Some(wait.unwrap_or(IDLE_WAIT))) => {}
                }
            }
        }
    }
    tracing::info!(worker_id, "Order worker stopped");
}

async fn process_task(
    ctx: &WorkerContext,
    worker_id: usize,
    task_id: i64,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let task = match repository::task::find_by_id(&ctx.pool, task_id).await? {
        Some(task) => task,
        None => {
            tracing::warn!(task_id, "Queued task vanished from database");
            return Ok(());
        }
    };
    // Canceled while waiting in the queue
    if task.state != TaskState::Queued {
        return Ok(());
    }

    let key = task.key();
    let _guard = match ctx.locks.try_lock(&key) {
        Some(guard) => guard,
        None => {
            // Another worker holds this key; come back shortly
            ctx.queue.requeue_after(task_id, LOCK_CONTENTION_DELAY).await;
            return Ok(());
        }
    };

    // Token before the state flip: a shutdown while throttled leaves the
    // row `queued` and it reloads cleanly on next startup.
    if !ctx.limiter.acquire(1.0, cancel).await {
        ctx.queue.requeue_after(task_id, Duration::ZERO).await;
        return Ok(());
    }

    let attempt_number = match repository::task::begin_attempt(&ctx.pool, task_id).await? {
        Some(n) => n,
        None => return Ok(()), // canceled under our feet
    };

    tracing::info!(worker_id, task_id, key = %key, attempt_number, "Placing order");
    let started_at = Utc::now();
    let result = ctx
        .provider
        .place_order(&task.sku_code, &task.facility_code, &task.options)
        .await;

    if let Err(persist_err) = record_outcome(ctx, task, attempt_number, started_at, result).await {
        tracing::error!(task_id, error = %persist_err, "Failed to persist attempt outcome");
        // Best effort: without this the row stays `attempting` until the
        // next startup recovery sweep.
        let note = format!("attempt outcome not persisted: {persist_err}");
        if let Err(e) = repository::task::mark_failed(&ctx.pool, task_id, &note).await {
            tracing::error!(task_id, error = %e, "Task left in attempting state");
        }
        return Err(persist_err.into());
    }
    Ok(())
}

/// Write the attempt audit row, flip the task state, notify. Any database
/// error here is handed back to the caller for the fallback path.
async fn record_outcome(
    ctx: &WorkerContext,
    task: shared::models::AcquisitionTask,
    attempt_number: i64,
    started_at: chrono::DateTime<Utc>,
    result: Result<provider_client::OrderReceipt, ProviderError>,
) -> RepoResult<()> {
    let task_id = task.id;
    match result {
        Ok(receipt) => {
            repository::attempt::insert(
                &ctx.pool,
                AttemptRecord {
                    task_id,
                    attempt_number,
                    started_at,
                    outcome: AttemptOutcome::Succeeded,
                    provider_code: None,
                    message: None,
                },
            )
            .await?;
            repository::task::mark_succeeded(&ctx.pool, task_id, &receipt.order_id, &receipt.order_url)
                .await?;
            tracing::info!(task_id, order_id = %receipt.order_id, "Order placed");
            ctx.notifier.send(NotificationEvent::OrderSucceeded {
                task_id,
                sku_code: task.sku_code,
                facility_code: task.facility_code,
                attempts: attempt_number,
                order_id: receipt.order_id,
                order_url: receipt.order_url,
            });
        }
        Err(e) => {
            let retryable = e.is_retryable();
            let outcome = if retryable {
                AttemptOutcome::Retryable
            } else {
                AttemptOutcome::Rejected
            };
            repository::attempt::insert(
                &ctx.pool,
                AttemptRecord {
                    task_id,
                    attempt_number,
                    started_at,
                    outcome,
                    provider_code: Some(&e.short_code()),
                    message: Some(&e.to_string()),
                },
            )
            .await?;

            if retryable && !ctx.retry.budget_exhausted(attempt_number) {
                let delay = retry_delay(&ctx.retry, &e, attempt_number);
                tracing::warn!(
                    task_id, attempt_number, error = %e, delay_ms = delay.as_millis() as u64,
                    "Order attempt failed, will retry"
                );
                repository::task::requeue_for_retry(&ctx.pool, task_id, &e.to_string()).await?;
                ctx.queue.requeue_after(task_id, delay).await;
            } else {
                tracing::error!(task_id, attempt_number, error = %e, "Order attempt failed permanently");
                repository::task::mark_failed(&ctx.pool, task_id, &e.to_string()).await?;
                ctx.notifier.send(NotificationEvent::OrderFailed {
                    task_id,
                    sku_code: task.sku_code,
                    facility_code: task.facility_code,
                    attempts: attempt_number,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Backoff for the next retry; provider `Retry-After` hints take priority
fn retry_delay(policy: &RetryPolicy, error: &ProviderError, attempt_number: i64) -> Duration {
    if let ProviderError::Throttled {
        retry_after_secs: Some(secs),
    } = error
    {
        return Duration::from_secs((*secs).min(policy.max_delay_ms / 1000));
    }
    policy.backoff(attempt_number.min(u32::MAX as i64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
        };
        for attempt in 1..=6u32 {
            let exp = attempt - 1;
            let base = (1000u64 << exp.min(20)).min(8000);
            for _ in 0..20 {
                let d = policy.backoff(attempt).as_millis() as u64;
                assert!(d >= base / 2, "attempt {attempt}: {d} < {}", base / 2);
                assert!(d <= base, "attempt {attempt}: {d} > {base}");
            }
        }
    }

    #[test]
    fn budget_counts_attempts_not_retries() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert!(!policy.budget_exhausted(1));
        assert!(!policy.budget_exhausted(2));
        assert!(policy.budget_exhausted(3));
    }

    #[test]
    fn throttle_hint_overrides_backoff() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 60_000,
        };
        let e = ProviderError::Throttled {
            retry_after_secs: Some(7),
        };
        assert_eq!(retry_delay(&policy, &e, 1), Duration::from_secs(7));
    }
}
