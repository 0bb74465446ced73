mod delivery;

pub use delivery::TelegramDeliveryChannel;

use std::sync::Arc;

use teloxide::{
    prelude::*, requests::Requester as _, types::UserId, utils::command::BotCommands,
};

use crate::book::{Requester, SharedBook};
use crate::clock::Clock;
use crate::commands::{self, Invocation};
use crate::delivery::ReminderDeliveryChannel;

type HandlerResult = anyhow::Result<()>;

/// Who may talk to the bot. Everyone when no owner is configured.
#[derive(Clone, Copy, Debug)]
struct Access {
    owner_id: Option<UserId>,
}

impl Access {
    fn permits(&self, msg: &Message) -> bool {
        self.permits_sender(sender_id(msg))
    }

    fn permits_sender(&self, sender: Option<UserId>) -> bool {
        self.owner_id.is_none() || self.is_owner(sender)
    }

    /// Admin commands need a configured owner.
    fn is_owner(&self, sender: Option<UserId>) -> bool {
        self.owner_id.is_some() && self.owner_id == sender
    }
}

fn sender_id(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|user| user.id)
}

pub struct TelegramInteractionInterface;
impl TelegramInteractionInterface {
    pub async fn start(
        bot: Bot,
        book: SharedBook,
        clock: Arc<dyn Clock>,
        delivery: Arc<dyn ReminderDeliveryChannel>,
        owner_id: Option<u64>,
    ) {
        log::info!("Creating Telegram interaction interface");

        if let Err(error) = bot.set_my_commands(GlobalCommand::bot_commands()).await {
            log::warn!("Could not register bot commands. [error = {}]", error);
        }

        let access = Access {
            owner_id: owner_id.map(UserId),
        };

        let schema = Update::filter_message()
            .filter(|msg: Message, access: Access| access.permits(&msg))
            .branch(teloxide::filter_command::<GlobalCommand, _>().endpoint(handle_command));

        Dispatcher::builder(bot, schema)
            .dependencies(dptree::deps![book, clock, delivery, access])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await
    }
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: GlobalCommand,
    book: SharedBook,
    clock: Arc<dyn Clock>,
    delivery: Arc<dyn ReminderDeliveryChannel>,
    access: Access,
) -> HandlerResult {
    if cmd.is_owner_only() && !access.is_owner(sender_id(&msg)) {
        bot.send_message(msg.chat.id, commands::OWNER_ONLY).await?;
        return Ok(());
    }

    let invocation = Invocation {
        requester: Requester {
            author: msg
                .from
                .as_ref()
                .map(|user| user.full_name())
                .unwrap_or_else(|| "Someone".to_string()),
            chat_id: msg.chat.id.0,
        },
        now: clock.now(),
    };

    let reply = {
        let mut book = book.lock().await;
        match cmd {
            GlobalCommand::Help => Ok(commands::HELP.to_string()),
            GlobalCommand::Remind(args) => commands::remind(&mut book, &invocation, &args).await,
            GlobalCommand::Periodic(args) => {
                commands::periodic(&mut book, &invocation, &args).await
            }
            GlobalCommand::Delay(args) => commands::delay(&mut book, &invocation, &args).await,
            GlobalCommand::List(args) => Ok(commands::list(&book, &invocation, &args)),
            GlobalCommand::Clear(args) => commands::clear(&mut book, &args).await,
            GlobalCommand::Timezone(args) => commands::timezone(&mut book, &args).await,
            GlobalCommand::Check => {
                Ok(commands::check(&mut book, delivery.as_ref(), &invocation).await)
            }
            GlobalCommand::Reload => commands::reload(&mut book).await,
        }
    };

    let text = reply.unwrap_or_else(|error| {
        log::error!("Command failed. [chat_id = {}, error = {:?}]", msg.chat.id.0, error);
        "Something went wrong, please try again later.".to_string()
    });

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum GlobalCommand {
    #[command(description = "show the supported commands.")]
    Help,
    #[command(description = "remind once: in <duration> <text> or at <date> [time] <text>.")]
    Remind(String),
    #[command(description = "repeat a reminder: <name> <duration> [xN] <text>.")]
    Periodic(String),
    #[command(description = "repeat the last announced reminder after <duration>.")]
    Delay(String),
    #[command(description = "list all reminders: [page].")]
    List(String),
    #[command(description = "delete a periodic reminder: <name>.")]
    Clear(String),
    #[command(description = "show or change the timezone: [name].")]
    Timezone(String),
    #[command(description = "announce due reminders now (owner only).")]
    Check,
    #[command(description = "reload reminders from storage (owner only).")]
    Reload,
}

impl GlobalCommand {
    fn is_owner_only(&self) -> bool {
        matches!(self, GlobalCommand::Check | GlobalCommand::Reload)
    }
}
