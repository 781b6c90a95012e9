//! Notification delivery seam

use async_trait::async_trait;
use thiserror::Error;

/// Delivery failure reported by a gateway
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Recipient blocked the bot
    #[error("recipient blocked the bot")]
    Blocked,

    /// Channel does not accept messages from us
    #[error("channel forbidden")]
    Forbidden,

    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Known-benign failures are not worth an error report
    pub fn is_benign(&self) -> bool {
        match self {
            DeliveryError::Blocked | DeliveryError::Forbidden => true,
            DeliveryError::Transport(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("blocked") || msg.contains("forbidden")
            }
        }
    }
}

/// Push delivery to a chat channel
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str, link: Option<&str>) -> Result<(), DeliveryError>;
}

/// Gateway that only writes deliveries to the log
#[derive(Debug, Default, Clone)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn send(&self, chat_id: i64, text: &str, link: Option<&str>) -> Result<(), DeliveryError> {
        tracing::info!(target: "notifications", chat_id, has_link = link.is_some(), "{}", text);
        Ok(())
    }
}
