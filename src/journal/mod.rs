//! Journal subsystem: the tag archive and the reminder scheduler.

pub mod archive;
pub mod message;
pub mod reminders;
pub mod tags;

pub use archive::TagArchive;
pub use message::TaggedMessage;
pub use reminders::{ReminderDelivery, ReminderRequest, ReminderScheduler};
pub use tags::{TagPreset, find_preset};
