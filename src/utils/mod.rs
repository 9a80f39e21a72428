//! Shared utilities used across `bookwatch`.

pub mod logging;
