use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::broker::engine::Shared;
use crate::broker::error::WaitError;
use crate::broker::message::{BookId, Event};
use crate::broker::topic::ListenerId;

/// The read side of one registration.
///
/// Fulfilled at most once. Dropping a handle that has not been fulfilled
/// removes its registration, so aborting or timing out the task that owns
/// it never leaves a dead entry behind.
#[derive(Debug)]
pub struct ListenerHandle {
    id: ListenerId,
    book_id: BookId,
    receiver: oneshot::Receiver<Event>,
    broker: Weak<Shared>,
    fulfilled: bool,
}

impl ListenerHandle {
    pub(crate) fn new(
        id: ListenerId,
        book_id: BookId,
        receiver: oneshot::Receiver<Event>,
        broker: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            book_id,
            receiver,
            broker,
            fulfilled: false,
        }
    }

    /// This registration's id, unique within its broker.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The book this handle waits on.
    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    /// Waits until an event is published for this book.
    ///
    /// Resolves to `WaitError::Cancelled` once the registration is gone
    /// without an event, i.e. after an unsubscribe or a broker shutdown.
    pub async fn wait(mut self) -> Result<Event, WaitError> {
        match (&mut self.receiver).await {
            Ok(event) => {
                self.fulfilled = true;
                Ok(event)
            }
            Err(_) => Err(WaitError::Cancelled),
        }
    }

    /// Like [`wait`](Self::wait), bounded by `timeout`. On expiry the handle
    /// is dropped and therefore unsubscribed.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<Event, WaitError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .unwrap_or(Err(WaitError::TimedOut))
    }

    pub(crate) fn is_from(&self, shared: &Arc<Shared>) -> bool {
        Weak::as_ptr(&self.broker) == Arc::as_ptr(shared)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.fulfilled {
            return;
        }
        if let Some(shared) = self.broker.upgrade()
            && shared.remove(self.book_id, self.id)
        {
            debug!(
                book_id = self.book_id,
                listener_id = self.id,
                "listener dropped before fulfillment"
            );
        }
    }
}
