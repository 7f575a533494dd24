//! Command surface: parsing, routing and digest rendering.

use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatKind, KeyboardButton, KeyboardMarkup, ParseMode};
use tracing::{info, warn};

use crate::BotState;
use crate::journal::message::{html_escape, truncate_safe};
use crate::journal::reminders::{MAX_DELAY_MINUTES, MIN_DELAY_MINUTES};
use crate::journal::{ReminderRequest, TagPreset, TaggedMessage, find_preset};

/// Command menu, in display order. Drives both /help and the menu Telegram
/// shows on "/".
pub const COMMANDS: &[(&str, &str)] = &[
    ("start", "Начать работу с ботом"),
    ("help", "Список команд"),
    ("info", "Информация о боте"),
    ("me", "Показать свои данные"),
    ("critical", "Критичные сообщения"),
    ("blocker", "Блокеры"),
    ("release", "Сообщения про релиз"),
    ("remind", "Напомнить через N минут"),
];

/// Max bytes of message text shown per digest line.
const EXCERPT_LENGTH: usize = 120;

/// Register the command menu with Telegram. Failure is not fatal.
pub async fn register_commands(bot: &Bot) {
    let commands: Vec<BotCommand> = COMMANDS
        .iter()
        .map(|(name, description)| BotCommand::new(*name, *description))
        .collect();
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("Failed to set bot commands: {e}");
    }
}

/// Split `/cmd@bot args` into the command name and its argument tail.
///
/// Returns None for non-commands and for commands addressed to another bot;
/// with no known own username, every addressed command is skipped.
pub fn parse_command<'a>(text: &'a str, bot_username: Option<&str>) -> Option<(String, &'a str)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let (head, args) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };

    let head = head.trim_start_matches('/');
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };

    // An addressed command is only ours when the suffix matches our
    // username; without one we cannot tell, so skip it
    if let Some(target) = target
        && !bot_username.is_some_and(|me| target.eq_ignore_ascii_case(me))
    {
        return None;
    }
    if name.is_empty() {
        return None;
    }

    Some((name.to_lowercase(), args))
}

/// Route a parsed command to its handler.
pub async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    name: &str,
    args: &str,
) -> ResponseResult<()> {
    match name {
        "start" => cmd_start(bot, msg).await,
        "help" => cmd_help(bot, msg).await,
        "info" => cmd_info(bot, msg, state).await,
        "me" => cmd_me(bot, msg).await,
        "remind" => cmd_remind(bot, msg, state, args).await,
        _ => match find_preset(name) {
            Some(preset) => cmd_digest(bot, msg, state, preset, args).await,
            None => {
                // In groups unknown commands are other bots' traffic
                if matches!(msg.chat.kind, ChatKind::Private(_)) {
                    bot.send_message(msg.chat.id, "Не знаю такую команду. Посмотри /help.")
                        .await?;
                }
                Ok(())
            }
        },
    }
}

async fn cmd_start(bot: &Bot, msg: &Message) -> ResponseResult<()> {
    let keyboard = KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new("/critical"),
            KeyboardButton::new("/blocker"),
            KeyboardButton::new("/release"),
        ],
        vec![KeyboardButton::new("/remind 30"), KeyboardButton::new("/help")],
    ])
    .resize_keyboard();

    bot.send_message(
        msg.chat.id,
        "Привет! Я веду журнал тегов в рабочих чатах. Кнопки ниже или /help.",
    )
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

async fn cmd_help(bot: &Bot, msg: &Message) -> ResponseResult<()> {
    let mut text = String::from("<b>Команды:</b>\n");
    for (name, description) in COMMANDS {
        text.push_str(&format!("/{name} — {description}\n"));
    }
    text.push_str(
        "\nТеги в чате: #критично, #блокер, #релиз. Латиницей тоже работают \
         (#critical, #blocker, #release, #deploy).",
    );

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn cmd_info(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    let journal_line = if state.archive.is_empty() {
        "Журнал пока пуст".to_string()
    } else {
        format!("Записей в журнале: {}", state.archive.len())
    };
    let text = format!(
        "🚀 Я бот-журнал для Yandex Tracker: запоминаю тегнутые сообщения и напоминаю о задачах.\n\
         Чатов под наблюдением: {}\n{}\nНапоминаний в очереди: {}",
        state.config.watched_chats.len(),
        journal_line,
        state.scheduler.pending_count(),
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn cmd_me(bot: &Bot, msg: &Message) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let mut text = format!(
        "🆔 Твой ID: {}\nИмя: {}",
        user.id,
        html_escape(&user.first_name)
    );
    if let Some(ref last_name) = user.last_name {
        text.push_str(&format!("\nФамилия: {}", html_escape(last_name)));
    }
    if let Some(ref username) = user.username {
        text.push_str(&format!("\nUsername: @{username}"));
    }
    if let Some(ref language_code) = user.language_code {
        text.push_str(&format!("\nЯзык: {language_code}"));
    }

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn cmd_digest(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    preset: &TagPreset,
    args: &str,
) -> ResponseResult<()> {
    let caller = msg.from.as_ref().map(|u| u.id.0 as i64);
    let author_id = match parse_author_arg(args, caller) {
        Ok(author_id) => author_id,
        Err(hint) => {
            bot.send_message(msg.chat.id, hint).await?;
            return Ok(());
        }
    };

    let found = state.archive.query_preset(preset, author_id);
    info!(
        "Digest /{} for chat {}: {} hit(s)",
        preset.command, msg.chat.id, found.len()
    );

    bot.send_message(msg.chat.id, render_digest(preset, &found))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn cmd_remind(bot: &Bot, msg: &Message, state: &BotState, args: &str) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let Ok(minutes) = args.trim().parse::<i64>() else {
        bot.send_message(
            msg.chat.id,
            format!("Формат: /remind <минуты>, от {MIN_DELAY_MINUTES} до {MAX_DELAY_MINUTES}."),
        )
        .await?;
        return Ok(());
    };

    let author_handle = match user.username {
        Some(ref username) => format!("@{username}"),
        None => user.first_name.clone(),
    };

    let request = ReminderRequest {
        delay_minutes: minutes,
        chat_id: msg.chat.id.0,
        author_handle,
    };

    match state.scheduler.schedule(request) {
        Ok(ack) => {
            info!("Reminder {} taken from user {}, fires at {}", ack.id, user.id, ack.fire_at);
            bot.send_message(msg.chat.id, format!("Ок, напомню через {minutes} мин."))
                .await?;
        }
        Err(e) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "Не получится: задержка от {MIN_DELAY_MINUTES} до {MAX_DELAY_MINUTES} минут, а не {}.",
                    e.0
                ),
            )
            .await?;
        }
    }
    Ok(())
}

/// Digest commands accept an optional author filter: "me" or a numeric id.
fn parse_author_arg(args: &str, caller: Option<i64>) -> Result<Option<i64>, &'static str> {
    let args = args.trim();
    if args.is_empty() {
        return Ok(None);
    }
    if args.eq_ignore_ascii_case("me") {
        return match caller {
            Some(id) => Ok(Some(id)),
            None => Err("Не вижу, кто спрашивает."),
        };
    }
    match args.parse::<i64>() {
        Ok(id) => Ok(Some(id)),
        Err(_) => Err("Непонятный фильтр: нужен \"me\" или числовой ID."),
    }
}

fn render_digest(preset: &TagPreset, found: &[TaggedMessage]) -> String {
    if found.is_empty() {
        return format!("{}: пока пусто.", preset.title);
    }

    let mut out = format!("<b>{}</b> ({}):\n", preset.title, found.len());
    for m in found {
        let who = m.author_handle.as_deref().unwrap_or("аноним");
        out.push_str(&format!(
            "• <a href=\"{}\">{}</a> — {}, {}\n",
            m.permalink(),
            excerpt(&m.text),
            html_escape(who),
            m.timestamp.format("%d.%m %H:%M"),
        ));
    }
    out
}

/// One-line, length-capped, HTML-safe cut of a message text.
fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let cut = truncate_safe(&flat, EXCERPT_LENGTH);
    let mut out = html_escape(cut);
    if cut.len() < flat.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn make_msg(id: i64, text: &str, handle: Option<&str>) -> TaggedMessage {
        TaggedMessage {
            message_id: id,
            chat_id: -1001234567890,
            author_id: Some(100),
            author_handle: handle.map(str::to_string),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_plain_command() {
        assert_eq!(parse_command("/help", None), Some(("help".to_string(), "")));
        assert_eq!(parse_command("/remind 30", None), Some(("remind".to_string(), "30")));
    }

    #[test]
    fn test_parse_command_is_case_insensitive() {
        assert_eq!(parse_command("/HELP", None), Some(("help".to_string(), "")));
    }

    #[test]
    fn test_parse_command_trims_whitespace() {
        assert_eq!(
            parse_command("  /critical   me  ", None),
            Some(("critical".to_string(), "me"))
        );
    }

    #[test]
    fn test_parse_addressed_command() {
        assert_eq!(
            parse_command("/critical@zhurnal_bot me", Some("zhurnal_bot")),
            Some(("critical".to_string(), "me"))
        );
        // Address matching ignores case
        assert_eq!(
            parse_command("/help@Zhurnal_Bot", Some("zhurnal_bot")),
            Some(("help".to_string(), ""))
        );
    }

    #[test]
    fn test_parse_rejects_foreign_bot() {
        assert_eq!(parse_command("/help@other_bot", Some("zhurnal_bot")), None);
    }

    #[test]
    fn test_parse_rejects_addressed_command_without_own_username() {
        // Can't confirm whose it is, so don't claim it
        assert_eq!(parse_command("/critical@zhurnal_bot me", None), None);
        // Plain commands still work
        assert_eq!(
            parse_command("/critical me", None),
            Some(("critical".to_string(), "me"))
        );
    }

    #[test]
    fn test_parse_rejects_non_commands() {
        assert_eq!(parse_command("hello", None), None);
        assert_eq!(parse_command("", None), None);
        assert_eq!(parse_command("/", None), None);
        assert_eq!(parse_command("see /help above", None), None);
    }

    #[test]
    fn test_author_arg_empty_means_no_filter() {
        assert_eq!(parse_author_arg("", Some(7)), Ok(None));
        assert_eq!(parse_author_arg("   ", Some(7)), Ok(None));
    }

    #[test]
    fn test_author_arg_me_resolves_to_caller() {
        assert_eq!(parse_author_arg("me", Some(7)), Ok(Some(7)));
        assert_eq!(parse_author_arg("ME", Some(7)), Ok(Some(7)));
        assert!(parse_author_arg("me", None).is_err());
    }

    #[test]
    fn test_author_arg_numeric_id() {
        assert_eq!(parse_author_arg("923847", Some(7)), Ok(Some(923847)));
        assert!(parse_author_arg("@alice", Some(7)).is_err());
    }

    #[test]
    fn test_render_digest_empty() {
        let preset = find_preset("critical").unwrap();
        assert_eq!(render_digest(preset, &[]), "Критичное: пока пусто.");
    }

    #[test]
    fn test_render_digest_lines() {
        let preset = find_preset("blocker").unwrap();
        let found = vec![
            make_msg(42, "#блокер миграция не едет", Some("alice")),
            make_msg(43, "#blocker waiting on infra", None),
        ];

        let digest = render_digest(preset, &found);
        assert!(digest.starts_with("<b>Блокеры</b> (2):\n"));
        assert!(digest.contains("https://t.me/c/1234567890/42"));
        assert!(digest.contains("#блокер миграция не едет"));
        assert!(digest.contains("alice"));
        assert!(digest.contains("аноним"));
    }

    #[test]
    fn test_render_digest_escapes_message_text() {
        let preset = find_preset("critical").unwrap();
        let found = vec![make_msg(1, "#критично <b>жирный</b> & co", Some("bob"))];

        let digest = render_digest(preset, &found);
        assert!(digest.contains("&lt;b&gt;жирный&lt;/b&gt; &amp; co"));
        assert!(!digest.contains("<b>жирный</b>"));
    }

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("одна\nдве строки"), "одна две строки");

        let long = "x".repeat(200);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= EXCERPT_LENGTH + 3);
    }
}
