use async_trait::async_trait;
use thiserror::Error;

use crate::reminder::ChatId;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The chat is gone or the bot can no longer post there.
    #[error("Destination {0} no longer accepts messages")]
    DestinationGone(ChatId),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Outbound side of announcements.
#[async_trait]
pub trait ReminderDeliveryChannel: Send + Sync {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), DeliveryError>;
}
