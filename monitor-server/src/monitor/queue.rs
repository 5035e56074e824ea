//! 抢购队列
//!
//! 持久化 FIFO：任务行落在 SQLite，内存里只保留就绪顺序。重试的任务带
//! `not_before` 回到队尾，worker 跳过未到期的槽位。
//!
//! 去重由两层保证：入队前在锁内查活跃键，加上任务表的部分唯一索引
//! （见 migrations/0001_init.sql）兜底并发窗口。

use crate::db::repository::{self, RepoError, RepoResult};
use shared::models::{EnqueueReceipt, TaskKey};
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

struct Slot {
    task_id: i64,
    not_before: Option<Instant>,
}

#[derive(Clone)]
pub struct AcquisitionQueue {
    pool: SqlitePool,
    inner: Arc<Mutex<VecDeque<Slot>>>,
    wakeup: Arc<Notify>,
}

impl AcquisitionQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            inner: Arc::new(Mutex::new(VecDeque::new())),
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Reload queued task IDs from the database (startup)
    pub async fn restore(&self) -> RepoResult<usize> {
        let ids = repository::task::queued_ids(&self.pool).await?;
        let count = ids.len();
        let mut inner = self.inner.lock().await;
        inner.clear();
        for task_id in ids {
            inner.push_back(Slot {
                task_id,
                not_before: None,
            });
        }
        drop(inner);
        if count > 0 {
            self.wakeup.notify_waiters();
        }
        Ok(count)
    }

    /// Enqueue a purchase intent, deduplicating against non-terminal tasks.
    ///
    /// Returns `accepted = false` with the existing task's ID when the key
    /// is already in flight.
    pub async fn enqueue(&self, key: &TaskKey) -> RepoResult<EnqueueReceipt> {
        // Check-then-insert stays inside the queue mutex so two enqueues
        // for the same key serialize here rather than on the DB index.
        let mut inner = self.inner.lock().await;

        if let Some(existing) = repository::task::find_active_by_key(&self.pool, key).await? {
            return Ok(EnqueueReceipt {
                task_id: existing.id,
                accepted: false,
            });
        }

        let task = match repository::task::create(&self.pool, key).await {
            Ok(task) => task,
            Err(RepoError::Duplicate(_)) => {
                // Lost a race with a writer outside this process
                let existing = repository::task::find_active_by_key(&self.pool, key)
                    .await?
                    .ok_or_else(|| {
                        RepoError::Database(format!("active task for {key} vanished mid-enqueue"))
                    })?;
                return Ok(EnqueueReceipt {
                    task_id: existing.id,
                    accepted: false,
                });
            }
            Err(e) => return Err(e),
        };

        inner.push_back(Slot {
            task_id: task.id,
            not_before: None,
        });
        drop(inner);
        self.wakeup.notify_one();

        tracing::info!(task_id = task.id, key = %key, "Task enqueued");
        Ok(EnqueueReceipt {
            task_id: task.id,
            accepted: true,
        })
    }

    /// Push a task back for retry, eligible again after `delay`
    pub async fn requeue_after(&self, task_id: i64, delay: tokio::time::Duration) {
        let mut inner = self.inner.lock().await;
        inner.push_back(Slot {
            task_id,
            not_before: Some(Instant::now() + delay),
        });
        drop(inner);
        self.wakeup.notify_one();
    }

    /// Pop the next ready task, or the wait until one matures.
    ///
    /// `None` means the queue is empty or every slot is still backing off;
    /// the second tuple element is how long the caller should park before
    /// asking again (`None` = until notified).
    pub async fn next_ready(&self) -> (Option<i64>, Option<tokio::time::Duration>) {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let mut nearest: Option<Instant> = None;

        for i in 0..inner.len() {
            let ready = match inner[i].not_before {
                None => true,
                Some(at) if at <= now => true,
                Some(at) => {
                    nearest = Some(nearest.map_or(at, |n: Instant| n.min(at)));
                    false
                }
            };
            if ready {
                let slot = inner.remove(i);
                let task_id = match slot {
                    Some(s) => s.task_id,
                    None => continue,
                };
                return (Some(task_id), None);
            }
        }
        (None, nearest.map(|at| at.saturating_duration_since(now)))
    }

    /// Wait for an enqueue/requeue signal, bounded by `timeout`
    pub async fn wait_for_work(&self, timeout: Option<tokio::time::Duration>) {
        match timeout {
            Some(t) => {
                let _ = tokio::time::timeout(t, self.wakeup.notified()).await;
            }
            None => self.wakeup.notified().await,
        }
    }

    /// Drop a task from the in-memory order (cancellation)
    pub async fn remove(&self, task_id: i64) {
        let mut inner = self.inner.lock().await;
        inner.retain(|slot| slot.task_id != task_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use tokio::time::Duration;

    async fn pool() -> SqlitePool {
        // One connection: every handle must see the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn ready_order_is_fifo() {
        let queue = AcquisitionQueue::new(pool().await);
        let a = queue
            .enqueue(&TaskKey::new("sku-a", "gra", vec![]))
            .await
            .unwrap();
        let b = queue
            .enqueue(&TaskKey::new("sku-b", "gra", vec![]))
            .await
            .unwrap();

        assert_eq!(queue.next_ready().await.0, Some(a.task_id));
        assert_eq!(queue.next_ready().await.0, Some(b.task_id));
        assert_eq!(queue.next_ready().await.0, None);
    }

    #[tokio::test]
    async fn duplicate_key_merges_into_existing_task() {
        let queue = AcquisitionQueue::new(pool().await);
        let key = TaskKey::new("sku", "gra", vec!["ram-64g".into()]);

        let first = queue.enqueue(&key).await.unwrap();
        assert!(first.accepted);
        let second = queue.enqueue(&key).await.unwrap();
        assert!(!second.accepted);
        assert_eq!(second.task_id, first.task_id);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn backoff_slot_matures_after_deadline() {
        let queue = AcquisitionQueue::new(pool().await);
        let receipt = queue
            .enqueue(&TaskKey::new("sku", "gra", vec![]))
            .await
            .unwrap();
        assert_eq!(queue.next_ready().await.0, Some(receipt.task_id));

        queue
            .requeue_after(receipt.task_id, Duration::from_millis(50))
            .await;
        let (id, wait) = queue.next_ready().await;
        assert!(id.is_none());
        assert!(wait.unwrap() <= Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(queue.next_ready().await.0, Some(receipt.task_id));
    }

    #[tokio::test]
    async fn restore_reloads_queued_rows() {
        let pool = pool().await;
        let queue = AcquisitionQueue::new(pool.clone());
        queue
            .enqueue(&TaskKey::new("sku-a", "gra", vec![]))
            .await
            .unwrap();
        queue
            .enqueue(&TaskKey::new("sku-b", "rbx", vec![]))
            .await
            .unwrap();

        // Simulated restart: a fresh queue instance over the same database
        let restarted = AcquisitionQueue::new(pool);
        assert_eq!(restarted.len().await, 0);
        assert_eq!(restarted.restore().await.unwrap(), 2);
        assert_eq!(restarted.len().await, 2);
    }
}
