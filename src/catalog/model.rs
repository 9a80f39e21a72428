use serde::{Deserialize, Serialize};

use crate::broker::BookId;

/// A book record. `available` flips back to `true` when a copy is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub year: String,
    #[serde(default)]
    pub available: bool,
}

/// Someone waiting to hear that a book is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub book_id: BookId,
}
