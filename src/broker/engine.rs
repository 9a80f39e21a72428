//! Broker engine
//!
//! The registry of waiting listeners, keyed by book ID, and the three
//! operations over it: subscribe, publish and unsubscribe.
//!
//! Concurrency notes:
//! - A single mutex guards the whole registry. `Broker` is a cheap clonable
//!   handle, so request handlers and background tasks share one registry
//!   without any locking of their own.
//! - The lock is never held while an event is handed to a listener.
//!   `publish` takes the listener set out of the registry first, then
//!   delivers outside the critical section.
//! - Delivery is a non-blocking one-shot send. A listener whose receiving
//!   side is gone is counted and skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::broker::error::BrokerError;
use crate::broker::listener::ListenerHandle;
use crate::broker::message::{BookId, Delivery, Event, PublishReport};
use crate::broker::topic::{ListenerId, Topic};
use crate::config::BrokerSettings;

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<BookId, Topic>,
    next_id: ListenerId,
    len: usize,
    closed: bool,
}

impl Registry {
    /// Removes one listener and drops the topic once it has no listeners left.
    fn remove(&mut self, book_id: BookId, id: ListenerId) -> bool {
        let Some(topic) = self.topics.get_mut(&book_id) else {
            return false;
        };
        let removed = topic.unsubscribe(id);
        if removed {
            self.len -= 1;
        }
        if topic.is_empty() {
            self.topics.remove(&book_id);
        }
        removed
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    registry: Mutex<Registry>,
    max_listeners: Option<usize>,
}

impl Shared {
    // Every critical section leaves the registry consistent, so a poisoned
    // lock still guards valid state.
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes one listener. `false` if it was already drained or removed.
    pub(crate) fn remove(&self, book_id: BookId, id: ListenerId) -> bool {
        self.registry().remove(book_id, id)
    }
}

/// Keyed one-shot publish/subscribe broker.
///
/// Cloning a `Broker` yields another handle to the same registry.
#[derive(Debug, Clone)]
pub struct Broker {
    shared: Arc<Shared>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// Creates a broker without a listener limit.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a broker limited by `settings.max_listeners`.
    pub fn with_settings(settings: &BrokerSettings) -> Self {
        Self::with_capacity(settings.max_listeners)
    }

    /// Creates a broker that refuses registrations once `max_listeners`
    /// listeners are pending at the same time.
    pub fn with_capacity(max_listeners: Option<usize>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                max_listeners,
            }),
        }
    }

    /// Registers a new listener for `book_id`.
    ///
    /// The returned handle receives at most one future event published for
    /// that book. Dropping it before then unsubscribes it.
    pub fn subscribe(&self, book_id: BookId) -> Result<ListenerHandle, BrokerError> {
        let (sender, receiver) = oneshot::channel();

        let id = {
            let mut registry = self.shared.registry();
            if registry.closed {
                return Err(BrokerError::Closed);
            }
            if let Some(limit) = self.shared.max_listeners
                && registry.len >= limit
            {
                warn!(book_id, limit, "listener capacity exhausted");
                return Err(BrokerError::RegistrationFailure { limit });
            }

            let id = registry.next_id;
            registry.next_id += 1;
            registry.len += 1;
            registry
                .topics
                .entry(book_id)
                .or_insert_with(|| Topic::new(book_id))
                .subscribe(id, sender);
            id
        };

        debug!(book_id, listener_id = id, "listener subscribed");
        Ok(ListenerHandle::new(
            id,
            book_id,
            receiver,
            Arc::downgrade(&self.shared),
        ))
    }

    /// Delivers `payload` to every listener registered for `book_id` and
    /// removes them from the registry.
    ///
    /// With no listeners this is a no-op: the event is dropped, not queued.
    pub fn publish(&self, book_id: BookId, payload: impl Into<String>) -> PublishReport {
        let listeners = {
            let mut registry = self.shared.registry();
            match registry.topics.remove(&book_id) {
                Some(mut topic) => {
                    let listeners = topic.drain();
                    registry.len -= listeners.len();
                    listeners
                }
                None => Vec::new(),
            }
        };

        let mut report = PublishReport::default();
        if listeners.is_empty() {
            debug!(book_id, "no listeners registered, event dropped");
            return report;
        }

        let event = Event::new(book_id, payload);
        for (listener_id, sender) in listeners {
            let delivery = deliver(sender, event.clone());
            if delivery == Delivery::RecipientGone {
                debug!(book_id, listener_id, "listener gone before delivery");
            }
            report.record(delivery);
        }

        info!(
            book_id,
            delivered = report.delivered,
            recipients_gone = report.recipients_gone,
            "event published"
        );
        report
    }

    /// Removes `handle` from the registry without delivering anything.
    ///
    /// Returns `false` if the handle was already fulfilled, already removed,
    /// or was issued by a different broker.
    pub fn unsubscribe(&self, handle: &ListenerHandle) -> bool {
        if !handle.is_from(&self.shared) {
            return false;
        }
        let removed = self.shared.remove(handle.book_id(), handle.id());
        if removed {
            debug!(
                book_id = handle.book_id(),
                listener_id = handle.id(),
                "listener unsubscribed"
            );
        }
        removed
    }

    /// Removes listener `id` of `book_id` by key, for owners that no longer
    /// hold its `ListenerHandle`.
    ///
    /// Returns `false` once a publish has drained the listener, so the
    /// caller knows the event is already on its way.
    pub(crate) fn remove(&self, book_id: BookId, id: ListenerId) -> bool {
        let removed = self.shared.remove(book_id, id);
        if removed {
            debug!(book_id, listener_id = id, "listener removed");
        }
        removed
    }

    /// Shuts the broker down: every pending listener is cancelled and new
    /// registrations are refused. Returns the number of cancelled listeners.
    pub fn close(&self) -> usize {
        let topics = {
            let mut registry = self.shared.registry();
            registry.closed = true;
            registry.len = 0;
            std::mem::take(&mut registry.topics)
        };

        let cancelled: usize = topics.values().map(Topic::len).sum();
        drop(topics);
        info!(cancelled, "broker closed");
        cancelled
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.registry().closed
    }

    /// The configured listener limit, if any.
    pub fn max_listeners(&self) -> Option<usize> {
        self.shared.max_listeners
    }

    /// Number of listeners currently waiting on `book_id`.
    pub fn listener_count(&self, book_id: BookId) -> usize {
        self.shared
            .registry()
            .topics
            .get(&book_id)
            .map_or(0, Topic::len)
    }

    /// Number of listeners currently waiting across all books.
    pub fn total_listeners(&self) -> usize {
        self.shared.registry().len
    }

    /// Number of books with at least one waiting listener.
    pub fn key_count(&self) -> usize {
        self.shared.registry().topics.len()
    }

    #[cfg(test)]
    pub(crate) fn is_registered(&self, book_id: BookId, id: ListenerId) -> bool {
        self.shared
            .registry()
            .topics
            .get(&book_id)
            .is_some_and(|topic| topic.contains(id))
    }
}

/// Hands `event` to one listener without blocking.
pub(crate) fn deliver(sender: oneshot::Sender<Event>, event: Event) -> Delivery {
    match sender.send(event) {
        Ok(()) => Delivery::Delivered,
        Err(_) => Delivery::RecipientGone,
    }
}
