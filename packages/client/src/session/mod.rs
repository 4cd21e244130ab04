//! Session Controller: connection lifecycle plus the state it drives.

pub mod controller;
pub mod state;

pub use controller::SessionController;
pub use state::{ChangeKind, ConnectionStatus, StateChange};
