//! Room/Identity State: the current room and display name.

/// Room a session starts in when nothing was persisted.
pub const DEFAULT_ROOM: &str = "general";

/// Display name a session starts with when nothing was persisted.
pub const DEFAULT_IDENTITY: &str = "Anonymous";

/// Current room and identity of a session.
///
/// Plain state. Joining the room on the relay is the session controller's
/// job; this type only records the names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    room: String,
    identity: String,
}

impl RoomState {
    pub fn new(room: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            identity: identity.into(),
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Record a new current room. Returns `true` if the value changed.
    pub fn set_room(&mut self, room: impl Into<String>) -> bool {
        let room = room.into();
        if self.room == room {
            return false;
        }
        self.room = room;
        true
    }

    /// Record a new display name. Returns `true` if the value changed.
    pub fn set_identity(&mut self, identity: impl Into<String>) -> bool {
        let identity = identity.into();
        if self.identity == identity {
            return false;
        }
        self.identity = identity;
        true
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM, DEFAULT_IDENTITY)
    }
}
