//! Poll scheduling
//!
//! Drives a periodic future on a runtime-adjustable interval. The interval
//! lives in an atomic so the HTTP control surface can retune a running
//! loop without restarting it; the new value applies from the next tick.

use crate::core::config::MIN_POLL_INTERVAL_SECS;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared, adjustable interval in whole seconds
#[derive(Clone)]
pub struct PollInterval(Arc<AtomicU64>);

impl PollInterval {
    /// Values below the floor are clamped up
    pub fn new(secs: u64) -> Self {
        Self(Arc::new(AtomicU64::new(secs.max(MIN_POLL_INTERVAL_SECS))))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns the effective (clamped) value
    pub fn set(&self, secs: u64) -> u64 {
        let effective = secs.max(MIN_POLL_INTERVAL_SECS);
        self.0.store(effective, Ordering::Relaxed);
        effective
    }
}

/// Run `tick` immediately, then every `interval`, until cancellation.
///
/// Ticks never overlap; a tick that outruns the interval simply delays
/// the next one.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    interval: PollInterval,
    cancel: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tracing::info!(task = name, interval_secs = interval.get(), "Periodic loop started");
    loop {
        tick().await;

        let sleep = Duration::from_secs(interval.get());
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(sleep) => {}
        }
    }
    tracing::info!(task = name, "Periodic loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn interval_clamps_to_floor() {
        let interval = PollInterval::new(1);
        assert_eq!(interval.get(), MIN_POLL_INTERVAL_SECS);
        assert_eq!(interval.set(3), MIN_POLL_INTERVAL_SECS);
        assert_eq!(interval.set(120), 120);
        assert_eq!(interval.get(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_interval_adjustments() {
        let interval = PollInterval::new(10);
        let cancel = CancellationToken::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let loop_handle = {
            let ticks = Arc::clone(&ticks);
            let interval = interval.clone();
            let cancel = cancel.clone();
            tokio::spawn(run_periodic("test", interval, cancel, move || {
                let ticks = Arc::clone(&ticks);
                async move {
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }))
        };

        tokio::time::advance(Duration::from_secs(25)).await;
        tokio::task::yield_now().await;
        // First tick at t=0, then t=10, t=20
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        interval.set(100);
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        // t=30 tick used the old 10s sleep already queued; afterwards 100s
        let after = ticks.load(Ordering::SeqCst);
        assert!(after <= 4);

        cancel.cancel();
        loop_handle.await.unwrap();
    }
}
