//! Keyed one-shot publish/subscribe broker.
//!
//! A [`Broker`] maps a book ID to the listeners waiting on it. Each call to
//! [`Broker::subscribe`] returns a [`ListenerHandle`] that receives at most
//! one [`Event`]. [`Broker::publish`] drains every listener registered for
//! the key at that moment; later subscribers never see earlier events.

pub mod engine;
pub mod error;
pub mod listener;
pub mod message;
pub mod topic;

pub use engine::Broker;
pub use error::{BrokerError, WaitError};
pub use listener::ListenerHandle;
pub use message::{AVAILABLE, BookId, Delivery, Event, PublishReport};
pub use topic::ListenerId;
