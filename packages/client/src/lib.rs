//! Client-side chat session manager.
//!
//! Maintains one connection to a chat relay, tracks the current room and
//! display name, keeps an ordered message history and persists that state
//! across restarts. The terminal front end in `runner` is a pure consumer of
//! the session.

// core
pub mod persistence;
pub mod room;
pub mod session;
pub mod store;
pub mod transport;

// layers
pub mod domain;
pub mod dto;

// presentation
pub mod formatter;
pub mod runner;
pub mod ui;

pub mod config;
pub mod error;

pub use config::ClientConfig;
pub use session::{ChangeKind, ConnectionStatus, SessionController, StateChange};
