//! The `catalog` module holds the book and subscriber records and the
//! service that ties the store to the notification broker.

pub mod model;
pub mod service;

use thiserror::Error;

use crate::broker::{BookId, BrokerError};
use crate::persistence::StoreError;

pub use model::{Book, Subscriber};
pub use service::CatalogService;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("book {0} not found")]
    BookNotFound(BookId),
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),
}
