use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use teloxide::Bot;
use tokio::sync::Mutex;

use remindme::appsettings::AppSettings;
use remindme::book::ReminderBook;
use remindme::clock::{Clock, SystemClock};
use remindme::delivery::ReminderDeliveryChannel;
use remindme::scheduling::Announcer;
use remindme::storage::{InMemoryReminderStorage, JsonFileReminderStorage, ReminderStorage};
use remindme::telegram::{TelegramDeliveryChannel, TelegramInteractionInterface};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::load().context("Could not load settings")?;
    let default_timezone = settings.default_timezone()?;

    let storage: Arc<dyn ReminderStorage> = match &settings.storage.path {
        Some(path) => {
            log::info!("Using JSON reminder store. [path = {}]", path.display());
            Arc::new(JsonFileReminderStorage::open(path).await?)
        }
        None => {
            log::warn!("No storage path configured, reminders will not survive a restart.");
            Arc::new(InMemoryReminderStorage::new())
        }
    };

    let book = Arc::new(Mutex::new(ReminderBook::load(storage, default_timezone).await?));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bot = Bot::new(settings.telegram.token.clone());

    let delivery: Arc<dyn ReminderDeliveryChannel> =
        Arc::new(TelegramDeliveryChannel::new(bot.clone()));

    let announcer = Announcer::spawn(
        book.clone(),
        delivery.clone(),
        clock.clone(),
        settings.check_interval(),
    );

    TelegramInteractionInterface::start(bot, book, clock, delivery, settings.telegram.owner_id)
        .await;

    log::info!("Shutting down.");
    announcer.stop(Duration::from_secs(10)).await;
    Ok(())
}
