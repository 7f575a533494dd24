mod commands;
mod config;
mod journal;
mod telegram;
mod telegram_log;

use std::collections::HashSet;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use config::Config;
use journal::{ReminderScheduler, TagArchive, TaggedMessage};
use telegram::TelegramClient;

struct BotState {
    config: Config,
    archive: TagArchive,
    scheduler: ReminderScheduler,
    bot_username: Option<String>,
    dm_denied: Mutex<HashSet<UserId>>,
}

impl BotState {
    async fn new(config: Config, bot: &Bot) -> Self {
        // Get bot info; the username routes /cmd@bot addressing
        let bot_username = match bot.get_me().await {
            Ok(me) => {
                info!("Bot user ID: {}, username: @{}", me.id, me.username());
                Some(me.username().to_string())
            }
            Err(e) => {
                warn!("Failed to get bot info: {e}");
                None
            }
        };

        let delivery = Arc::new(TelegramClient::new(bot.clone()));
        let scheduler = ReminderScheduler::new(delivery);

        Self {
            config,
            archive: TagArchive::new(),
            scheduler,
            bot_username,
            dm_denied: Mutex::new(HashSet::new()),
        }
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "zhurnal.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("zhurnal.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let tg_layer = telegram_log::TelegramLogLayer::new(bot.clone(), log_chat_id);
        registry.with(tg_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting zhurnal...");
    info!("Loaded config from {config_path}");
    info!(
        "Watching {} chat(s), owners: {:?}",
        config.watched_chats.len(),
        config.owner_ids
    );

    commands::register_commands(&bot).await;

    let state = Arc::new(BotState::new(config, &bot).await);

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_new_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_new_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let is_group = matches!(msg.chat.kind, ChatKind::Public(_));
    let is_private = matches!(msg.chat.kind, ChatKind::Private(_));

    // DMs: owner-only command surface
    if is_private {
        let Some(ref user) = msg.from else {
            return Ok(());
        };
        let username = user.username.as_deref().unwrap_or(&user.first_name);

        if !state.config.is_owner(user.id) {
            let mut denied = state.dm_denied.lock().await;
            if denied.insert(user.id) {
                info!("Denied DM from non-owner {} ({})", username, user.id);
                bot.send_message(msg.chat.id, "Доступ закрыт.").await.ok();
            }
            return Ok(());
        }

        let Some(text) = msg.text() else {
            return Ok(());
        };
        info!("📨 DM from {} ({})", username, user.id);

        if let Some((name, args)) = commands::parse_command(text, state.bot_username.as_deref()) {
            return commands::handle_command(&bot, &msg, &state, &name, args).await;
        }
        bot.send_message(msg.chat.id, "Я понимаю только команды. Посмотри /help.")
            .await
            .ok();
        return Ok(());
    }

    if !is_group {
        return Ok(());
    }

    if !state.config.is_watched(msg.chat.id) {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    // Journal first: every text message from a watched chat is recorded,
    // commands included. Tags are matched at query time, not here.
    state.archive.append(telegram_to_tagged(&msg));

    if let Some((name, args)) = commands::parse_command(text, state.bot_username.as_deref()) {
        return commands::handle_command(&bot, &msg, &state, &name, args).await;
    }

    Ok(())
}

fn telegram_to_tagged(msg: &Message) -> TaggedMessage {
    let user = msg.from.as_ref();
    let author_handle = user.map(|u| u.username.as_deref().unwrap_or(&u.first_name).to_string());

    TaggedMessage {
        message_id: msg.id.0 as i64,
        chat_id: msg.chat.id.0,
        author_id: user.map(|u| u.id.0 as i64),
        author_handle,
        timestamp: msg.date,
        text: msg.text().unwrap_or("").to_string(),
    }
}
