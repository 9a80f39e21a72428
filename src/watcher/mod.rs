//! Background tasks that wait for a book to become available.
//!
//! A [`Watcher`] registers a listener with the broker and spawns a task that
//! owns it. When the listener is fulfilled the task hands a [`Notice`] to a
//! [`Notifier`]. Cancelling the task (directly, through a timeout, or by
//! dropping the [`WatchSet`] of a closed connection) drops the listener,
//! which removes it from the broker.

pub mod notifier;
pub mod set;
pub mod task;

pub use notifier::{LogNotifier, Notice, Notifier, Subscription};
pub use set::WatchSet;
pub use task::{WatchHandle, WatchOutcome, Watcher};
