//! Notification Model
//!
//! Fire-and-forget events fanned out to external channels (Telegram).
//! Delivery failure never blocks the engine.

use serde::{Deserialize, Serialize};

use super::{StockStatus, TransitionEvent};

/// Event handed to the notification dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NotificationEvent {
    AvailabilityTransition {
        sku_code: String,
        facility_code: String,
        from: StockStatus,
        to: StockStatus,
        raw_status: String,
    },
    OrderSucceeded {
        task_id: i64,
        sku_code: String,
        facility_code: String,
        attempts: i64,
        order_id: String,
        order_url: String,
    },
    OrderFailed {
        task_id: i64,
        sku_code: String,
        facility_code: String,
        attempts: i64,
        error: String,
    },
    /// Operator-triggered configuration check
    Test,
}

impl NotificationEvent {
    pub fn from_transition(ev: &TransitionEvent) -> Self {
        NotificationEvent::AvailabilityTransition {
            sku_code: ev.sku_code.clone(),
            facility_code: ev.facility_code.clone(),
            from: ev.from,
            to: ev.to,
            raw_status: ev.raw_status.clone(),
        }
    }

    /// Render the message body sent to the chat channel
    pub fn render_text(&self) -> String {
        match self {
            NotificationEvent::AvailabilityTransition {
                sku_code,
                facility_code,
                from,
                to,
                raw_status,
            } => {
                if to.is_available() {
                    format!(
                        "📦 库存上架提醒\n\nSKU: {sku_code}\n数据中心: {facility_code}\n状态: {raw_status}\n({from:?} → {to:?})",
                    )
                } else {
                    format!(
                        "📉 库存下架\n\nSKU: {sku_code}\n数据中心: {facility_code}\n({from:?} → {to:?})",
                    )
                }
            }
            NotificationEvent::OrderSucceeded {
                task_id,
                sku_code,
                facility_code,
                attempts,
                order_id,
                order_url,
            } => format!(
                "🎉 抢购成功！🎉\n\nSKU: {sku_code}\n数据中心: {facility_code}\n订单 ID: {order_id}\n订单链接: {order_url}\n尝试次数: {attempts}\n任务 ID: {task_id}",
            ),
            NotificationEvent::OrderFailed {
                task_id,
                sku_code,
                facility_code,
                attempts,
                error,
            } => format!(
                "❌ 抢购失败\n\nSKU: {sku_code}\n数据中心: {facility_code}\n尝试次数: {attempts}\n错误: {error}\n任务 ID: {task_id}",
            ),
            NotificationEvent::Test => "🔔 监控测试通知\n\n✅ 通知配置正常！".to_string(),
        }
    }
}
