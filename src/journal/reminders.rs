//! One-shot reminder timers.
//!
//! Each schedule call spawns an independent timer task; after the delay it
//! pings the target chat once through [`ReminderDelivery`]. There is no
//! retry: a reminder that cannot be delivered has no value once its moment
//! has passed, so failures are logged and the reminder dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{info, warn};

/// Inclusive bounds for a reminder delay.
pub const MIN_DELAY_MINUTES: i64 = 1;
pub const MAX_DELAY_MINUTES: i64 = 60;

/// Rejected delay value (carries what the user asked for).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDelay(pub i64);

impl std::fmt::Display for InvalidDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reminder delay must be {MIN_DELAY_MINUTES}-{MAX_DELAY_MINUTES} minutes, got {}",
            self.0
        )
    }
}

impl std::error::Error for InvalidDelay {}

/// A reminder as requested by a user.
#[derive(Debug, Clone)]
pub struct ReminderRequest {
    pub delay_minutes: i64,
    pub chat_id: i64,
    /// Mention text for the ping, e.g. "@alice".
    pub author_handle: String,
}

/// Acknowledgement for an accepted reminder. The id is opaque; there is no
/// cancellation API, it only shows up in logs.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledReminder {
    pub id: u64,
    pub fire_at: DateTime<Utc>,
}

/// Delivers a fired reminder to its chat.
#[async_trait]
pub trait ReminderDelivery: Send + Sync {
    async fn deliver_reminder(&self, chat_id: i64, author_handle: &str) -> Result<(), String>;
}

/// Schedules one-shot reminders.
pub struct ReminderScheduler {
    delivery: Arc<dyn ReminderDelivery>,
    minute: Duration,
    next_id: AtomicU64,
    pending: Arc<AtomicUsize>,
}

impl ReminderScheduler {
    pub fn new(delivery: Arc<dyn ReminderDelivery>) -> Self {
        Self::with_minute(delivery, Duration::from_secs(60))
    }

    /// Same as [`ReminderScheduler::new`] with a custom minute length.
    /// Timer tests run on milliseconds.
    pub fn with_minute(delivery: Arc<dyn ReminderDelivery>, minute: Duration) -> Self {
        Self {
            delivery,
            minute,
            next_id: AtomicU64::new(1),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a one-shot reminder. Fails only on an out-of-range delay.
    ///
    /// Reminders are not deduplicated: the same user may hold any number of
    /// pending ones, and they fire in wall-clock expiry order, not the order
    /// they were scheduled.
    pub fn schedule(&self, req: ReminderRequest) -> Result<ScheduledReminder, InvalidDelay> {
        if !(MIN_DELAY_MINUTES..=MAX_DELAY_MINUTES).contains(&req.delay_minutes) {
            return Err(InvalidDelay(req.delay_minutes));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fire_at = Utc::now() + chrono::Duration::minutes(req.delay_minutes);
        let delay = self.minute * req.delay_minutes as u32;

        self.pending.fetch_add(1, Ordering::SeqCst);
        let delivery = Arc::clone(&self.delivery);
        let pending = Arc::clone(&self.pending);

        // Log before the spawn; the timer task takes `req` with it
        info!(
            "Scheduled reminder {id}: {} min for {} in chat {}",
            req.delay_minutes, req.author_handle, req.chat_id
        );

        tokio::spawn(async move {
            sleep(delay).await;
            match delivery.deliver_reminder(req.chat_id, &req.author_handle).await {
                Ok(()) => info!("⏰ Reminder {id} fired for {} in chat {}", req.author_handle, req.chat_id),
                Err(e) => warn!("Reminder {id} dropped: {e}"),
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(ScheduledReminder { id, fire_at })
    }

    /// Reminders scheduled but not yet fired or dropped.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}
