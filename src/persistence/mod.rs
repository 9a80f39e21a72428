//! The `persistence` module stores book and subscriber records.
//!
//! [`CatalogStore`] is the narrow interface the catalog service talks to.
//! [`SledStore`] implements it on top of `sled`, an embedded key-value
//! store. Availability events are never stored here; they only live in
//! the broker until delivered.

pub mod sled_store;

use thiserror::Error;

use crate::broker::BookId;
use crate::catalog::model::{Book, Subscriber};

pub use sled_store::SledStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),
    #[error("corrupt record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("record id space exhausted at {0}")]
    IdExhausted(u64),
}

/// Record storage used by the catalog service.
///
/// Row-count results mirror SQL semantics: `update_book` and `remove_book`
/// return how many records were touched (0 or 1).
pub trait CatalogStore: Send + Sync {
    fn books(&self) -> Result<Vec<Book>, StoreError>;
    fn book(&self, id: BookId) -> Result<Option<Book>, StoreError>;
    /// Inserts `book` under a freshly assigned id, ignoring `book.id`.
    fn add_book(&self, book: &Book) -> Result<BookId, StoreError>;
    fn update_book(&self, book: &Book) -> Result<u64, StoreError>;
    fn remove_book(&self, id: BookId) -> Result<u64, StoreError>;
    fn add_subscriber(&self, email: &str, book_id: BookId) -> Result<Subscriber, StoreError>;
    fn subscribers_for(&self, book_id: BookId) -> Result<Vec<Subscriber>, StoreError>;
}

#[cfg(test)]
mod tests;
