use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::{BookId, Broker, BrokerError, Event, ListenerId, WaitError};
use crate::config::BrokerSettings;
use crate::watcher::notifier::{Notice, Notifier, Subscription};

/// How a watcher task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Notified(Event),
    Cancelled,
    TimedOut,
}

/// Spawns one waiting task per subscription.
#[derive(Debug, Clone)]
pub struct Watcher {
    broker: Broker,
    timeout: Option<Duration>,
}

impl Watcher {
    /// Creates a watcher over `broker`. `None` waits without a bound.
    pub fn new(broker: Broker, timeout: Option<Duration>) -> Self {
        Self { broker, timeout }
    }

    /// Creates a watcher bounded by `settings.watch_timeout_secs`.
    pub fn from_settings(broker: Broker, settings: &BrokerSettings) -> Self {
        Self::new(broker, settings.watch_timeout_secs.map(Duration::from_secs))
    }

    /// The broker watchers register with.
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// How long each watcher waits before giving up.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Registers a listener for `subscription.book_id` and spawns the task
    /// waiting on it. Must be called from within a tokio runtime.
    ///
    /// The listener is registered before this returns, so any publish for
    /// the book that starts afterwards reaches it.
    pub fn spawn(
        &self,
        subscription: Subscription,
        notifier: Arc<dyn Notifier>,
    ) -> Result<WatchHandle, BrokerError> {
        let handle = self.broker.subscribe(subscription.book_id)?;
        let book_id = handle.book_id();
        let listener_id = handle.id();
        let timeout = self.timeout;

        let join = tokio::spawn(async move {
            let result = match timeout {
                Some(timeout) => handle.wait_timeout(timeout).await,
                None => handle.wait().await,
            };

            match result {
                Ok(event) => {
                    notifier.notify(&Notice::new(&subscription, &event));
                    WatchOutcome::Notified(event)
                }
                Err(WaitError::Cancelled) => {
                    debug!(
                        book_id,
                        subscriber_id = subscription.subscriber_id,
                        "watch cancelled"
                    );
                    WatchOutcome::Cancelled
                }
                Err(WaitError::TimedOut) => {
                    info!(
                        book_id,
                        subscriber_id = subscription.subscriber_id,
                        "watch timed out"
                    );
                    WatchOutcome::TimedOut
                }
            }
        });

        Ok(WatchHandle {
            join,
            broker: self.broker.clone(),
            book_id,
            listener_id,
        })
    }
}

/// Handle to a running watcher task.
///
/// Dropping it detaches the task; use [`cancel`](Self::cancel) to stop it.
#[derive(Debug)]
pub struct WatchHandle {
    join: JoinHandle<WatchOutcome>,
    broker: Broker,
    book_id: BookId,
    listener_id: ListenerId,
}

impl WatchHandle {
    /// The book being watched.
    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    /// The broker registration backing this watcher.
    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Stops the watcher if its listener is still waiting.
    ///
    /// The listener is taken out of the broker before the task is aborted.
    /// If a publish already drained it, the event is in flight and the task
    /// is left to notify and finish. Returns whether the watcher was stopped.
    pub fn cancel(&self) -> bool {
        if !self.broker.remove(self.book_id, self.listener_id) {
            return false;
        }
        self.join.abort();
        true
    }

    /// Whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the task to end.
    pub async fn outcome(self) -> WatchOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => WatchOutcome::Cancelled,
            Err(e) => {
                warn!(book_id = self.book_id, "watcher task failed: {e}");
                WatchOutcome::Cancelled
            }
        }
    }
}
