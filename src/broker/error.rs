use thiserror::Error;

/// Errors returned when registering a listener.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("listener capacity exhausted ({limit} registered)")]
    RegistrationFailure { limit: usize },
    #[error("broker is shut down")]
    Closed,
}

/// Why a wait on a listener ended without an event.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The registration was removed (unsubscribe or shutdown) before delivery.
    #[error("listener was cancelled before an event arrived")]
    Cancelled,
    #[error("timed out waiting for an event")]
    TimedOut,
}
