//! Tag marker presets behind the digest commands.
//!
//! Markers are literal substrings. Teams tag the same concept in more than
//! one spelling, so each preset enumerates every accepted variant instead of
//! normalizing; adding a spelling is a one-line edit here.

/// A named set of equivalent tag markers.
pub struct TagPreset {
    /// Command name that triggers the digest (without the slash).
    pub command: &'static str,
    /// Digest heading.
    pub title: &'static str,
    /// Accepted spellings. A message matches if it contains ANY of these.
    pub markers: &'static [&'static str],
}

pub const CRITICAL: TagPreset = TagPreset {
    command: "critical",
    title: "Критичное",
    markers: &["#критично", "#critical"],
};

pub const BLOCKER: TagPreset = TagPreset {
    command: "blocker",
    title: "Блокеры",
    markers: &["#блокер", "#blocker"],
};

/// Covers the whole release pipeline, not a single tag.
pub const RELEASE: TagPreset = TagPreset {
    command: "release",
    title: "Релиз",
    markers: &["#релиз", "#release", "#деплой", "#deploy"],
};

pub const PRESETS: [&TagPreset; 3] = [&CRITICAL, &BLOCKER, &RELEASE];

/// Look up a preset by its command name.
pub fn find_preset(command: &str) -> Option<&'static TagPreset> {
    PRESETS.iter().copied().find(|p| p.command == command)
}
