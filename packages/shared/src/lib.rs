//! Utilities shared across the relay-chat packages.

pub mod logger;
pub mod time;
