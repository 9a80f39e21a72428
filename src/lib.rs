//! # bookwatch
//!
//! `bookwatch` is a small book catalog service with availability
//! notifications. Clients manage book records over a WebSocket connection
//! and can register interest in a book; when the book is marked available
//! again, every registered party is notified exactly once.
//!
//! ## Core Modules
//!
//! - `broker`: keyed one-shot publish/subscribe registry (book ID -> listeners).
//! - `watcher`: background tasks that wait on a listener and run a side effect.
//! - `catalog`: book/subscriber records and the catalog service.
//! - `config`: loading server, broker, store and logging settings.
//! - `persistence`: the `sled`-backed store for books and subscribers.
//! - `transport`: the WebSocket server and its JSON protocol.
//! - `utils`: logging setup.

pub mod broker;
pub mod catalog;
pub mod config;
pub mod persistence;
pub mod transport;
pub mod utils;
pub mod watcher;
