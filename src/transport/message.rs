use serde::{Deserialize, Serialize};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::BookId;
use crate::catalog::Book;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "list_books")]
    ListBooks,
    #[serde(rename = "get_book")]
    GetBook { id: BookId },
    #[serde(rename = "add_book")]
    AddBook { book: Book },
    #[serde(rename = "update_book")]
    UpdateBook { book: Book },
    #[serde(rename = "remove_book")]
    RemoveBook { id: BookId },
    #[serde(rename = "subscribe")]
    Subscribe { email: String, book_id: BookId },
    #[serde(rename = "notify")]
    Notify { book_id: BookId },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "books")]
    Books { books: Vec<Book> },
    #[serde(rename = "book")]
    Book { book: Book },
    #[serde(rename = "book_added")]
    BookAdded { id: BookId },
    #[serde(rename = "rows_affected")]
    RowsAffected { rows: u64 },
    #[serde(rename = "subscribed")]
    Subscribed { subscriber_id: i64, book_id: BookId },
    #[serde(rename = "notified")]
    Notified { count: usize },
    /// Pushed unprompted when a watched book becomes available.
    #[serde(rename = "available")]
    Available {
        subscriber_id: i64,
        book_id: BookId,
        payload: String,
        timestamp: i64,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    /// Serializes into a text frame.
    pub fn to_ws(&self) -> Result<WsMessage, serde_json::Error> {
        Ok(WsMessage::text(serde_json::to_string(self)?))
    }
}
