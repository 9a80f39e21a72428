use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::{Db, Tree};
use tracing::debug;

use crate::broker::BookId;
use crate::catalog::model::{Book, Subscriber};
use crate::persistence::{CatalogStore, StoreError};

const BOOKS_TREE: &str = "books";
const SUBSCRIBERS_TREE: &str = "subscribers";

/// `sled`-backed catalog store.
///
/// Books and subscribers live in separate trees keyed by their id in
/// big-endian order, so iteration follows id order. Values are JSON.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    books: Tree,
    subscribers: Tree,
}

impl SledStore {
    /// Opens or creates the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that is deleted when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let books = db.open_tree(BOOKS_TREE)?;
        let subscribers = db.open_tree(SUBSCRIBERS_TREE)?;
        Ok(Self {
            db,
            books,
            subscribers,
        })
    }

    /// Writes pending changes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    // Ids start at 1, like a SQL serial column.
    fn next_id(&self) -> Result<i64, StoreError> {
        record_id(self.db.generate_id()?)
    }
}

/// Maps a sled-generated id onto the 1-based id space of the records.
pub(crate) fn record_id(generated: u64) -> Result<i64, StoreError> {
    i64::try_from(generated)
        .ok()
        .and_then(|id| id.checked_add(1))
        .ok_or(StoreError::IdExhausted(generated))
}

fn key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

impl CatalogStore for SledStore {
    fn books(&self) -> Result<Vec<Book>, StoreError> {
        self.books
            .iter()
            .map(|res| {
                let (_, value) = res?;
                decode(&value)
            })
            .collect()
    }

    fn book(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        self.books
            .get(key(id))?
            .map(|value| decode(&value))
            .transpose()
    }

    fn add_book(&self, book: &Book) -> Result<BookId, StoreError> {
        let id = self.next_id()?;
        let stored = Book {
            id,
            ..book.clone()
        };
        self.books.insert(key(id), encode(&stored)?)?;
        debug!(book_id = id, "book added");
        Ok(id)
    }

    fn update_book(&self, book: &Book) -> Result<u64, StoreError> {
        let encoded = encode(book)?;
        // Only overwrite an existing record; a missing id stays missing.
        let previous = self
            .books
            .fetch_and_update(key(book.id), |old| old.map(|_| encoded.clone()))?;
        Ok(u64::from(previous.is_some()))
    }

    fn remove_book(&self, id: BookId) -> Result<u64, StoreError> {
        let removed = self.books.remove(key(id))?;
        Ok(u64::from(removed.is_some()))
    }

    fn add_subscriber(&self, email: &str, book_id: BookId) -> Result<Subscriber, StoreError> {
        let subscriber = Subscriber {
            id: self.next_id()?,
            email: email.to_string(),
            book_id,
        };
        self.subscribers
            .insert(key(subscriber.id), encode(&subscriber)?)?;
        debug!(subscriber_id = subscriber.id, book_id, "subscriber added");
        Ok(subscriber)
    }

    fn subscribers_for(&self, book_id: BookId) -> Result<Vec<Subscriber>, StoreError> {
        let mut found = Vec::new();
        for res in self.subscribers.iter() {
            let (_, value) = res?;
            let subscriber: Subscriber = decode(&value)?;
            if subscriber.book_id == book_id {
                found.push(subscriber);
            }
        }
        Ok(found)
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("books", &self.books.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
