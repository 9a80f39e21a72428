//! The `transport` module serves the catalog over WebSockets.
//!
//! It defines the JSON protocol spoken with clients and the server that
//! parses client requests, forwards them to the [`CatalogService`] and
//! pushes availability notices back to the connection that asked for them.
//!
//! [`CatalogService`]: crate::catalog::CatalogService

pub mod message;
pub mod websocket;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests;
