use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::broker::message::{BookId, Event};

/// Identifies one registration. Never reused within a broker.
pub type ListenerId = u64;

/// The set of listeners currently waiting on one book.
///
/// Every entry is the write half of a one-shot endpoint. An entry lives
/// here only until it is drained by a publish or removed by an unsubscribe.
#[derive(Debug)]
pub struct Topic {
    pub book_id: BookId,
    listeners: HashMap<ListenerId, oneshot::Sender<Event>>,
}

impl Topic {
    /// Creates an empty topic for `book_id`.
    pub fn new(book_id: BookId) -> Self {
        Self {
            book_id,
            listeners: HashMap::new(),
        }
    }

    /// Adds the write half of listener `id`.
    pub fn subscribe(&mut self, id: ListenerId, sender: oneshot::Sender<Event>) {
        self.listeners.insert(id, sender);
    }

    /// Returns `true` if the listener was still registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Takes every listener out of the topic, leaving it empty.
    pub fn drain(&mut self) -> Vec<(ListenerId, oneshot::Sender<Event>)> {
        self.listeners.drain().collect()
    }

    /// Whether listener `id` is still waiting here.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(&id)
    }

    /// Number of waiting listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is waiting.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
