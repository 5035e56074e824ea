//! 通知分发
//!
//! Fire-and-forget：引擎把事件塞进有界通道立即返回，分发 worker 慢慢
//! 发 Telegram。通道满了就丢弃并记日志，通知永远不能拖住轮询或下单。

use shared::models::NotificationEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 256;

/// Cheap cloneable handle used by the engine and workers
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    /// Non-blocking send; a full channel drops the event
    pub fn send(&self, event: NotificationEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(error = %e, "Notification channel full, event dropped");
        }
    }
}

/// Telegram delivery settings; `None` disables the channel entirely
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Build the notifier handle and its dispatch worker future.
///
/// The returned future must be spawned by the caller; it exits when the
/// cancellation token fires and the channel drains.
pub fn channel(
    telegram: Option<TelegramConfig>,
    cancel: CancellationToken,
) -> (Notifier, impl std::future::Future<Output = ()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let notifier = Notifier { tx };
    let worker = dispatch_loop(rx, telegram, cancel);
    (notifier, worker)
}

async fn dispatch_loop(
    mut rx: mpsc::Receiver<NotificationEvent>,
    telegram: Option<TelegramConfig>,
    cancel: CancellationToken,
) {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .ok();

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            ev = rx.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
        };

        let text = event.render_text();
        tracing::info!(event = ?event_kind(&event), "Dispatching notification");

        match (&telegram, &http) {
            (Some(cfg), Some(client)) => {
                if let Err(e) = send_telegram(client, cfg, &text).await {
                    // Logged, never retried
                    tracing::warn!(error = %e, "Telegram delivery failed");
                }
            }
            _ => {
                tracing::debug!("No notification channel configured, event logged only");
            }
        }
    }
    tracing::debug!("Notification dispatcher stopped");
}

async fn send_telegram(
    client: &reqwest::Client,
    cfg: &TelegramConfig,
    text: &str,
) -> Result<(), anyhow::Error> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", cfg.bot_token);
    let resp = client
        .post(&url)
        .json(&serde_json::json!({
            "chat_id": cfg.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        }))
        .send()
        .await?;
    if !resp.status().is_success() {
        anyhow::bail!("Telegram API returned {}", resp.status());
    }
    Ok(())
}

fn event_kind(event: &NotificationEvent) -> &'static str {
    match event {
        NotificationEvent::AvailabilityTransition { .. } => "availability-transition",
        NotificationEvent::OrderSucceeded { .. } => "order-succeeded",
        NotificationEvent::OrderFailed { .. } => "order-failed",
        NotificationEvent::Test => "test",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let notifier = Notifier { tx };
        notifier.send(NotificationEvent::Test);
        // Second send hits a full channel and must return immediately
        notifier.send(NotificationEvent::Test);
    }

    #[tokio::test]
    async fn dispatcher_exits_on_cancel() {
        let cancel = CancellationToken::new();
        let (notifier, worker) = channel(None, cancel.clone());
        let handle = tokio::spawn(worker);
        notifier.send(NotificationEvent::Test);
        cancel.cancel();
        handle.await.unwrap();
    }
}
