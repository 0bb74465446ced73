use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::book::ReminderBook;
use crate::clock::Clock;
use crate::delivery::ReminderDeliveryChannel;

use super::task::ScheduledTask;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(45);

/// Periodically announces due reminders.
pub struct Announcer {
    task: ScheduledTask,
}

impl Announcer {
    /// Starts the announcement loop. The first pass runs immediately.
    pub fn spawn(
        book: Arc<Mutex<ReminderBook>>,
        delivery: Arc<dyn ReminderDeliveryChannel>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();
        let period = period.max(Duration::from_secs(1));

        log::info!("Starting announcer. [period = {:?}]", period);
        let task_handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_cancellation_token.cancelled() => {
                        log::info!("Announcer was cancelled.");
                        break;
                    },
                    _ = interval.tick() => {
                        announce_once(&book, delivery.as_ref(), clock.as_ref()).await;
                    }
                }
            }
        });

        Self {
            task: ScheduledTask::new(task_handle, cancellation_token),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn stop(self, timeout: Duration) {
        self.task.cancel(timeout).await;
    }
}

/// Runs a single announcement pass while holding the book.
pub async fn announce_once(
    book: &Mutex<ReminderBook>,
    delivery: &dyn ReminderDeliveryChannel,
    clock: &dyn Clock,
) -> usize {
    let mut book = book.lock().await;
    let now = clock.now();
    log::debug!("Checking for due reminders. [now = {}]", now);
    book.announce_due(now, delivery).await
}
