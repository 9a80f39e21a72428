use serde::{Deserialize, Serialize};

/// Identifier of a book record. Used as the topic key of the broker.
pub type BookId = i64;

/// Payload published when a book becomes available again.
pub const AVAILABLE: &str = "Available";

/// A one-shot event handed to every listener of a book.
///
/// # Fields
///
/// - `book_id` - The book the event was published for.
/// - `payload` - Opaque content, `"Available"` for availability updates.
/// - `timestamp` - Unix timestamp in milliseconds taken at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub book_id: BookId,
    pub payload: String,
    pub timestamp: i64,
}

impl Event {
    /// An event stamped with the current time in milliseconds.
    pub fn new(book_id: BookId, payload: impl Into<String>) -> Self {
        Self {
            book_id,
            payload: payload.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Result of handing an event to a single listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The listener's receiving side was dropped before the event arrived.
    RecipientGone,
}

/// Summary of one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub recipients_gone: usize,
}

impl PublishReport {
    /// Counts one delivery outcome.
    pub fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::RecipientGone => self.recipients_gone += 1,
        }
    }

    /// `true` when nobody was registered for the key.
    pub fn is_noop(&self) -> bool {
        self.delivered == 0 && self.recipients_gone == 0
    }
}
