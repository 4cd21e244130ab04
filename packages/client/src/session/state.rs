//! Connection status and change notifications.

use std::fmt;

/// Connection lifecycle state, owned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// What changed in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Initial state restored from persistence
    Hydrated,
    Status(ConnectionStatus),
    MessageAppended,
    RoomChanged,
    IdentityChanged,
}

/// Latest change published to subscribers.
///
/// `revision` increases by one per change, so a subscriber that lagged can
/// tell how much it missed and re-read the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub revision: u64,
    pub kind: ChangeKind,
}

impl StateChange {
    pub(crate) fn initial() -> Self {
        Self {
            revision: 0,
            kind: ChangeKind::Hydrated,
        }
    }
}
