use serde::{Deserialize, Serialize};
use tracing::info;

use crate::broker::{BookId, Event};

/// Who is waiting for which book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber_id: i64,
    pub email: String,
    pub book_id: BookId,
}

/// What a notifier is told when a watched book becomes available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub subscriber_id: i64,
    pub email: String,
    pub book_id: BookId,
    pub payload: String,
    pub timestamp: i64,
}

impl Notice {
    /// Joins a subscription with the event that fulfilled it.
    pub fn new(subscription: &Subscription, event: &Event) -> Self {
        Self {
            subscriber_id: subscription.subscriber_id,
            email: subscription.email.clone(),
            book_id: event.book_id,
            payload: event.payload.clone(),
            timestamp: event.timestamp,
        }
    }
}

/// Side effect performed once a subscriber's book is available.
///
/// Called from the watcher task, never from the publishing request, so a
/// slow notifier does not hold up `publish`.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Notifier that records each notification as a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        info!(
            subscriber_id = notice.subscriber_id,
            email = %notice.email,
            book_id = notice.book_id,
            payload = %notice.payload,
            "notification sent: book {} is now available",
            notice.book_id
        );
    }
}
