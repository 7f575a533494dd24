//! Mirrors tracing events into a Telegram chat.
//!
//! WARN and ERROR go out immediately with a level prefix; INFO lines are
//! buffered and flushed as one message when the buffer ages out or fills up.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// How long INFO lines may sit in the buffer before a flush.
const FLUSH_AFTER: Duration = Duration::from_secs(5);
/// Flush early once this many INFO lines are buffered.
const FLUSH_AT: usize = 50;
/// Telegram message size limit, with headroom.
const MAX_CHARS: usize = 4000;

struct LogLine {
    urgent: bool,
    text: String,
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl TelegramLogLayer {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(bot, chat_id, rx));
        Self { tx }
    }
}

async fn drain(bot: Bot, chat_id: ChatId, mut rx: mpsc::UnboundedReceiver<LogLine>) {
    let mut buffer: Vec<String> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let line = match deadline {
            Some(at) => {
                tokio::select! {
                    line = rx.recv() => line,
                    _ = sleep_until(at) => {
                        post(&bot, chat_id, &buffer.join("\n")).await;
                        buffer.clear();
                        deadline = None;
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        let Some(line) = line else { break };

        if line.urgent {
            post(&bot, chat_id, &line.text).await;
            continue;
        }

        buffer.push(line.text);
        if buffer.len() >= FLUSH_AT {
            post(&bot, chat_id, &buffer.join("\n")).await;
            buffer.clear();
            deadline = None;
        } else if deadline.is_none() {
            deadline = Some(Instant::now() + FLUSH_AFTER);
        }
    }
}

async fn post(bot: &Bot, chat_id: ChatId, text: &str) {
    if text.is_empty() {
        return;
    }
    let mut text = text.to_string();
    if text.chars().count() > MAX_CHARS {
        text = text.chars().take(MAX_CHARS).collect();
        text.push_str("...");
    }
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("Failed to mirror log to Telegram: {e}");
    }
}

/// Pulls the `message` field out of an event; other fields trail it.
struct MessageVisitor {
    message: String,
    extra: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.extra.push(format!("{}={value:?}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();

        // Only INFO and louder is worth a chat message
        if level > Level::INFO {
            return;
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
            extra: Vec::new(),
        };
        event.record(&mut visitor);

        let mut text = visitor.message;
        if !visitor.extra.is_empty() {
            text.push_str(&format!(" ({})", visitor.extra.join(", ")));
        }

        let line = match level {
            Level::ERROR => LogLine { urgent: true, text: format!("❌ {text}") },
            Level::WARN => LogLine { urgent: true, text: format!("⚠️ {text}") },
            _ => LogLine { urgent: false, text },
        };

        if self.tx.send(line).is_err() {
            eprintln!("Log mirror channel closed, line dropped");
        }
    }
}
