use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::book::Requester;
use crate::delivery::{DeliveryError, ReminderDeliveryChannel};
use crate::reminder::ChatId;

pub const LISBON: Tz = chrono_tz::Europe::Lisbon;

/// Wall-clock time in Lisbon given as `DD/MM/YYYY HH:mm`.
pub fn lisbon_utc(text: &str) -> DateTime<Utc> {
    let local = NaiveDateTime::parse_from_str(text, "%d/%m/%Y %H:%M").unwrap();
    LISBON
        .from_local_datetime(&local)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

pub fn requester() -> Requester {
    Requester {
        author: "ana".to_string(),
        chat_id: 42,
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Outcome {
    Delivered,
    Gone,
    Broken,
}

/// Records every message and answers with a fixed outcome.
#[derive(Clone)]
pub struct RecordingChannel {
    pub sent: Arc<Mutex<Vec<(ChatId, String)>>>,
    outcome: Outcome,
}

impl RecordingChannel {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            sent: Arc::default(),
            outcome,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ReminderDeliveryChannel for RecordingChannel {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        match self.outcome {
            Outcome::Delivered => Ok(()),
            Outcome::Gone => Err(DeliveryError::DestinationGone(chat_id)),
            Outcome::Broken => Err(anyhow::anyhow!("connection reset").into()),
        }
    }
}
