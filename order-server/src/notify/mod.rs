//! 通知模块
//!
//! 订单核心在事务提交后把 [`Notification`] 放入无界通道 (同步、非阻塞)，
//! [`NotificationWorker`] 在后台解析接收人并逐个投递。投递失败只记录日志，
//! 从不回滚订单，也不会影响调用方的响应。

pub mod gateway;
pub mod message;
pub mod worker;

pub use gateway::{DeliveryError, LogGateway, NotificationGateway};
pub use worker::{DeliveryReport, NotificationWorker};

use tokio::sync::mpsc;

/// 待投递的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// 新订单：通知同地区的维修站以及所有管理员
    OrderCreated { order_id: i64 },
    /// 状态变更：通知指定接收人
    StatusChanged {
        order_id: i64,
        recipients: Vec<i64>,
        text: String,
    },
    /// 订单长时间停留在 CREATED：通知管理员
    OrderAging { order_id: i64, minutes: i64 },
}

impl Notification {
    pub fn order_id(&self) -> i64 {
        match self {
            Notification::OrderCreated { order_id }
            | Notification::StatusChanged { order_id, .. }
            | Notification::OrderAging { order_id, .. } => *order_id,
        }
    }
}

pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

/// 通知发送端 (可克隆，可在同步代码中使用)
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// 创建通道
    pub fn channel() -> (Self, NotificationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 入队；worker 已停止时只记录警告
    pub fn send(&self, notification: Notification) {
        let order_id = notification.order_id();
        if self.tx.send(notification).is_err() {
            tracing::warn!(order_id, "Notification channel closed, message dropped");
        }
    }
}
