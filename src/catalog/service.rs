use std::sync::Arc;

use tracing::{info, warn};

use crate::broker::{AVAILABLE, BookId, Broker};
use crate::catalog::CatalogError;
use crate::catalog::model::{Book, Subscriber};
use crate::persistence::CatalogStore;
use crate::watcher::{Notice, Notifier, Subscription, WatchHandle, Watcher};

/// Request-level operations of the catalog.
///
/// Every operation is a single round trip to the store. The only state
/// shared between requests is the broker behind the watcher.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    watcher: Watcher,
    notifier: Arc<dyn Notifier>,
}

impl CatalogService {
    /// Builds the service over a record store, a watcher and the default
    /// notifier used by [`create_subscriber`](Self::create_subscriber).
    pub fn new(store: Arc<dyn CatalogStore>, watcher: Watcher, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            watcher,
            notifier,
        }
    }

    /// The broker behind the service's watcher.
    pub fn broker(&self) -> &Broker {
        self.watcher.broker()
    }

    /// The default notifier.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    /// Every stored book.
    pub fn list_books(&self) -> Result<Vec<Book>, CatalogError> {
        Ok(self.store.books()?)
    }

    /// One book by id, or [`CatalogError::BookNotFound`].
    pub fn get_book(&self, id: BookId) -> Result<Book, CatalogError> {
        self.store.book(id)?.ok_or(CatalogError::BookNotFound(id))
    }

    /// Stores a new book and returns its assigned id.
    pub fn add_book(&self, book: &Book) -> Result<BookId, CatalogError> {
        Ok(self.store.add_book(book)?)
    }

    /// Stores `book` and, when it is marked available, notifies everyone
    /// currently waiting on it. Returns the number of updated records.
    pub fn update_book(&self, book: &Book) -> Result<u64, CatalogError> {
        let rows = self.store.update_book(book)?;
        if book.available {
            self.broker().publish(book.id, AVAILABLE);
        }
        Ok(rows)
    }

    /// Deletes a book. Returns the number of removed records.
    pub fn remove_book(&self, id: BookId) -> Result<u64, CatalogError> {
        Ok(self.store.remove_book(id)?)
    }

    /// Stores a subscriber and starts watching its book with the default
    /// notifier.
    pub fn create_subscriber(
        &self,
        email: &str,
        book_id: BookId,
    ) -> Result<(Subscriber, WatchHandle), CatalogError> {
        self.create_subscriber_with(email, book_id, self.notifier.clone())
    }

    /// Like [`create_subscriber`](Self::create_subscriber), delivering the
    /// notice to `notifier` instead.
    pub fn create_subscriber_with(
        &self,
        email: &str,
        book_id: BookId,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(Subscriber, WatchHandle), CatalogError> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(CatalogError::InvalidEmail(email.to_string()));
        }

        let subscriber = self.store.add_subscriber(email, book_id)?;
        let subscription = Subscription {
            subscriber_id: subscriber.id,
            email: subscriber.email.clone(),
            book_id,
        };
        let handle = self.watcher.spawn(subscription, notifier).inspect_err(|e| {
            warn!(
                subscriber_id = subscriber.id,
                book_id, "subscriber stored but not watched: {e}"
            );
        })?;

        info!(subscriber_id = subscriber.id, book_id, "subscriber created");
        Ok((subscriber, handle))
    }

    /// Notifies every stored subscriber of `book_id`, whether or not a
    /// watcher is still running for them.
    pub fn send_notification(&self, book_id: BookId) -> Result<Vec<Subscriber>, CatalogError> {
        let subscribers = self.store.subscribers_for(book_id)?;
        let timestamp = chrono::Utc::now().timestamp_millis();
        for subscriber in &subscribers {
            self.notifier.notify(&Notice {
                subscriber_id: subscriber.id,
                email: subscriber.email.clone(),
                book_id,
                payload: AVAILABLE.to_string(),
                timestamp,
            });
        }
        Ok(subscribers)
    }

    /// Closes the broker; every pending watcher ends as cancelled.
    pub fn shutdown(&self) -> usize {
        self.broker().close()
    }
}
