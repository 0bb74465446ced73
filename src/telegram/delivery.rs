use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};

use crate::delivery::{DeliveryError, ReminderDeliveryChannel};

pub struct TelegramDeliveryChannel {
    bot: Bot,
}

impl TelegramDeliveryChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ReminderDeliveryChannel for TelegramDeliveryChannel {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        match self.bot.send_message(ChatId(chat_id), text).await {
            Ok(_) => Ok(()),
            Err(error) if is_destination_gone(&error) => Err(DeliveryError::DestinationGone(chat_id)),
            Err(error) => Err(anyhow::Error::from(error).into()),
        }
    }
}

fn is_destination_gone(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(
            ApiError::ChatNotFound
                | ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
                | ApiError::UserDeactivated
        )
    )
}
