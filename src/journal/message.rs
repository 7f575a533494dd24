//! Captured message record and HTML rendering helpers.
//!
//! Digest replies use Telegram's HTML parse mode, so anything that came
//! from users is escaped: `<`, `>`, `&` become `&lt;`, `&gt;`, `&amp;`.

use chrono::{DateTime, Utc};

/// A message captured from a watched chat. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedMessage {
    pub message_id: i64,
    /// Chat ID where this message was seen (negative = group).
    pub chat_id: i64,
    /// Sender ID; absent for anonymous or system posts.
    pub author_id: Option<i64>,
    /// Sender's @username, or their first name when they have none.
    pub author_handle: Option<String>,
    /// Capture time, second precision (the Telegram message date).
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl TaggedMessage {
    /// Permalink to this message.
    ///
    /// Supergroup chat ids carry a `-100` prefix that t.me links omit:
    /// chat `-1001234567890`, message `42` → `https://t.me/c/1234567890/42`.
    pub fn permalink(&self) -> String {
        let chat = self.chat_id.to_string();
        let suffix = chat.strip_prefix("-100").unwrap_or(&chat);
        format!("https://t.me/c/{}/{}", suffix, self.message_id)
    }
}

/// Escape a string for safe inclusion in HTML-mode message text.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

/// Safely truncate a string at a char boundary.
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    // Find the last valid char boundary at or before max_bytes
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
