//! Append-only journal of messages seen in watched chats.
//!
//! Nothing is classified on the way in: every captured message lands here,
//! and tag markers are matched at query time. Entries are never mutated or
//! removed; the journal grows for the process lifetime.

use std::sync::RwLock;

use tracing::debug;

use crate::journal::message::TaggedMessage;
use crate::journal::tags::TagPreset;

/// Max entries a single query returns.
pub const PAGE_SIZE: usize = 10;

/// Append-only in-memory message store with tag queries.
pub struct TagArchive {
    messages: RwLock<Vec<TaggedMessage>>,
}

impl TagArchive {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Append a captured message. Messages with empty text are ignored;
    /// nothing else can make this fail.
    pub fn append(&self, msg: TaggedMessage) {
        if msg.text.is_empty() {
            debug!("Skipping empty message {} in chat {}", msg.message_id, msg.chat_id);
            return;
        }
        self.messages.write().expect("journal lock poisoned").push(msg);
    }

    pub fn len(&self) -> usize {
        self.messages.read().expect("journal lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages containing any of `markers`, optionally restricted to one
    /// author. Most recent first; equal timestamps keep append order. At
    /// most [`PAGE_SIZE`] entries; an empty result is a normal value.
    pub fn query(&self, markers: &[&str], author_id: Option<i64>) -> Vec<TaggedMessage> {
        let messages = self.messages.read().expect("journal lock poisoned");
        let mut hits: Vec<TaggedMessage> = messages
            .iter()
            .filter(|m| markers.iter().any(|marker| m.text.contains(marker)))
            .filter(|m| author_id.is_none_or(|id| m.author_id == Some(id)))
            .cloned()
            .collect();
        // Stable sort, so ties stay in append order
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(PAGE_SIZE);
        hits
    }

    /// Run a preset digest query.
    pub fn query_preset(&self, preset: &TagPreset, author_id: Option<i64>) -> Vec<TaggedMessage> {
        self.query(preset.markers, author_id)
    }
}

impl Default for TagArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::tags::CRITICAL;
    use chrono::DateTime;

    fn make_msg(id: i64, text: &str, at: i64, author: Option<i64>) -> TaggedMessage {
        TaggedMessage {
            message_id: id,
            chat_id: -1001234567890,
            author_id: author,
            author_handle: author.map(|a| format!("user{a}")),
            timestamp: DateTime::from_timestamp(at, 0).unwrap(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_append_and_len() {
        let archive = TagArchive::new();
        assert!(archive.is_empty());

        archive.append(make_msg(1, "обычное сообщение", 100, Some(1)));
        archive.append(make_msg(2, "#критично прод лежит", 101, Some(1)));
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_empty_text_ignored() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "", 100, Some(1)));
        assert!(archive.is_empty());
    }

    #[test]
    fn test_empty_archive_queries_are_empty() {
        let archive = TagArchive::new();
        assert!(archive.query(&["#критично"], None).is_empty());
        assert!(archive.query(&[], Some(42)).is_empty());
    }

    #[test]
    fn test_or_semantics_across_markers() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "упал деплой #критично", 100, Some(1)));
        archive.append(make_msg(2, "ждём ревью #critical", 101, Some(2)));
        archive.append(make_msg(3, "просто болтовня", 102, Some(3)));

        let found = archive.query(&["#критично", "#critical"], None);
        assert_eq!(found.len(), 2);
        // A message matching only one of the markers is still returned
        assert!(found.iter().any(|m| m.message_id == 1));
        assert!(found.iter().any(|m| m.message_id == 2));
        // A message matching neither never is
        assert!(!found.iter().any(|m| m.message_id == 3));
    }

    #[test]
    fn test_author_filter_is_exact() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "#блокер миграция", 100, Some(10)));
        archive.append(make_msg(2, "#блокер ревью", 101, Some(20)));
        archive.append(make_msg(3, "#блокер без автора", 102, None));

        let found = archive.query(&["#блокер"], Some(10));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message_id, 1);

        // Authorless rows never match an author filter
        let found = archive.query(&["#блокер"], Some(999));
        assert!(found.is_empty());
    }

    #[test]
    fn test_marker_and_author_filters_compose() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "#критично база", 100, Some(10)));
        archive.append(make_msg(2, "payments down #critical", 200, Some(20)));
        archive.append(make_msg(3, "#critical очередь встала", 300, Some(10)));
        archive.append(make_msg(4, "#блокер другое", 400, Some(10)));

        // Any-marker OR, then exact author, newest first
        let found = archive.query(&["#критично", "#critical"], Some(10));
        let ids: Vec<i64> = found.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_unfiltered_query_is_superset_of_filtered() {
        let archive = TagArchive::new();
        for i in 0..5 {
            archive.append(make_msg(i, "#релиз готовим", 100 + i, Some(i % 2)));
        }

        let all = archive.query(&["#релиз"], None);
        let filtered = archive.query(&["#релиз"], Some(0));
        assert!(filtered.len() < all.len());
        for m in &filtered {
            assert!(all.contains(m));
        }
    }

    #[test]
    fn test_sorted_newest_first() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "#критично первое", 100, Some(1)));
        archive.append(make_msg(2, "#критично второе", 300, Some(1)));
        archive.append(make_msg(3, "#критично третье", 200, Some(1)));

        let found = archive.query(&["#критично"], None);
        let ids: Vec<i64> = found.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_equal_timestamps_keep_append_order() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "#критично a", 100, Some(1)));
        archive.append(make_msg(2, "#критично b", 100, Some(1)));
        archive.append(make_msg(3, "#критично c", 100, Some(1)));

        let found = archive.query(&["#критично"], None);
        let ids: Vec<i64> = found.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_result_capped_at_page_size() {
        let archive = TagArchive::new();
        for i in 0..25 {
            archive.append(make_msg(i, "#критично шум", 100 + i, Some(1)));
        }

        let found = archive.query(&["#критично"], None);
        assert_eq!(found.len(), PAGE_SIZE);
        // The cap keeps the most recent entries, not the oldest
        assert_eq!(found[0].message_id, 24);
        assert_eq!(found[PAGE_SIZE - 1].message_id, 15);
    }

    #[test]
    fn test_cap_with_equal_timestamps_keeps_append_order() {
        let archive = TagArchive::new();
        for i in 0..15 {
            archive.append(make_msg(i, "#критично шторм", 100, Some(1)));
        }

        // All ties: the page is the first ten appended, in append order
        let found = archive.query(&["#критично"], None);
        let ids: Vec<i64> = found.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, (0..PAGE_SIZE as i64).collect::<Vec<i64>>());
    }

    #[test]
    fn test_untagged_rows_are_stored_but_never_returned() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "у кого ключ от переговорки?", 100, Some(1)));
        archive.append(make_msg(2, "/help", 101, Some(1)));

        assert_eq!(archive.len(), 2);
        assert!(archive.query(&["#критично", "#блокер", "#релиз"], None).is_empty());
    }

    #[test]
    fn test_query_preset_matches_both_spellings() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "LB отвечает 502 #критично", 100, Some(1)));
        archive.append(make_msg(2, "payments down #critical", 101, Some(2)));

        let found = archive.query_preset(&CRITICAL, None);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_marker_is_plain_substring_not_word() {
        let archive = TagArchive::new();
        archive.append(make_msg(1, "тегнул как #критично2, норм?", 100, Some(1)));

        // Substring semantics by design
        assert_eq!(archive.query(&["#критично"], None).len(), 1);
    }
}
