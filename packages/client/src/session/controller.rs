//! Session Controller.
//!
//! Owns the connection lifecycle and is the only writer of the message store
//! and the room/identity state. Each connect cycle gets a fresh binding from
//! the factory, tagged with a generation; transport handlers carry that
//! generation and a weak reference back to the session, so a torn-down
//! binding can never mutate state.
//!
//! Transport calls and snapshot writes are never made while the state lock is
//! held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use relay_chat_shared::time::{Clock, SystemClock};
use serde_json::Value;
use tokio::sync::watch;

use super::state::{ChangeKind, ConnectionStatus, StateChange};
use crate::{
    config::ClientConfig,
    domain::{Message, Timestamp},
    dto::{ChatMessageDto, InboundEvent, OutboundEvent, conversion::timestamp_to_wire},
    persistence::{PendingSave, PersistenceAdapter},
    room::RoomState,
    store::MessageStore,
    transport::{
        EVENT_CONNECT, EVENT_DISCONNECT, EVENT_RECEIVE_MESSAGE, EventHandler, Transport,
        TransportFactory, handler,
    },
};

/// Events the controller subscribes to on every binding
const SUBSCRIBED_EVENTS: [&str; 3] = [EVENT_CONNECT, EVENT_DISCONNECT, EVENT_RECEIVE_MESSAGE];

/// A binding attached to the session for one connect cycle
struct Binding {
    generation: u64,
    transport: Arc<dyn Transport>,
    handlers: Vec<(&'static str, EventHandler)>,
}

struct SessionState {
    status: ConnectionStatus,
    room: RoomState,
    store: MessageStore,
    binding: Option<Binding>,
    last_generation: u64,
    revision: u64,
}

impl SessionState {
    fn attached_transport(&self, generation: u64) -> Option<Arc<dyn Transport>> {
        self.binding
            .as_ref()
            .filter(|b| b.generation == generation)
            .map(|b| b.transport.clone())
    }

    fn is_attached(&self, generation: u64) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| b.generation == generation)
    }
}

struct SessionInner {
    state: Mutex<SessionState>,
    factory: Box<dyn TransportFactory>,
    persistence: PersistenceAdapter,
    config: ClientConfig,
    changes: watch::Sender<StateChange>,
    clock: Box<dyn Clock>,
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a change. Called with the state lock held so revisions reach
    /// subscribers in order.
    fn notify(&self, state: &mut SessionState, kind: ChangeKind) {
        state.revision += 1;
        self.changes.send_replace(StateChange {
            revision: state.revision,
            kind,
        });
    }

    fn set_status(&self, state: &mut SessionState, status: ConnectionStatus) {
        if state.status != status {
            tracing::debug!("Session status {} -> {}", state.status, status);
            state.status = status;
            self.notify(state, ChangeKind::Status(status));
        }
    }

    /// Capture the persisted fields. Must run under the state lock so pending
    /// saves are ordered like the state they copy; write them after unlocking.
    fn capture(&self, state: &SessionState) -> PendingSave {
        self.persistence.capture(&state.store, &state.room)
    }

    /// Entry point for every handler registered on a binding.
    fn on_transport_event(&self, generation: u64, event: &str, payload: &Value) {
        match InboundEvent::parse(event, payload) {
            Ok(InboundEvent::Connect) => self.on_connect(generation),
            Ok(InboundEvent::Disconnect) => self.on_disconnect(generation),
            Ok(InboundEvent::ReceiveMessage(dto)) => self.on_receive_message(generation, dto),
            Ok(InboundEvent::Other { event }) => {
                tracing::debug!("Ignoring unsubscribed event '{}'", event);
            }
            Err(e) => {
                tracing::warn!("Dropping inbound event: {}", e);
            }
        }
    }

    fn on_connect(&self, generation: u64) {
        let join = {
            let mut state = self.lock();
            let Some(transport) = state.attached_transport(generation) else {
                tracing::debug!("Ignoring connect from detached binding #{}", generation);
                return;
            };

            match state.status {
                ConnectionStatus::Connecting => {
                    self.set_status(&mut state, ConnectionStatus::Connected);
                    tracing::info!("Connected, joining room '{}'", state.room.room());
                    Some((transport, state.room.room().to_string()))
                }
                ConnectionStatus::Connected | ConnectionStatus::Disconnected => {
                    tracing::debug!(
                        "Ignoring connect for binding #{} while {}",
                        generation,
                        state.status
                    );
                    None
                }
            }
        };

        if let Some((transport, room)) = join {
            emit(transport.as_ref(), OutboundEvent::JoinRoom(room));
        }
    }

    fn on_disconnect(&self, generation: u64) {
        let mut state = self.lock();
        if !state.is_attached(generation) {
            tracing::debug!("Ignoring disconnect from detached binding #{}", generation);
            return;
        }

        if state.status != ConnectionStatus::Disconnected {
            tracing::info!("Connection lost");
            self.set_status(&mut state, ConnectionStatus::Disconnected);
        }
    }

    fn on_receive_message(&self, generation: u64, dto: ChatMessageDto) {
        let message = match Message::try_from(dto) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping inbound message: {}", e);
                return;
            }
        };

        let pending = {
            let mut state = self.lock();
            if !state.is_attached(generation) {
                tracing::debug!("Ignoring message from detached binding #{}", generation);
                return;
            }

            if message.timestamp().is_invalid() {
                tracing::debug!("Message from '{}' has no usable timestamp", message.user());
            }

            let len = state.store.append(message);
            tracing::trace!("Appended message, history length {}", len);
            self.notify(&mut state, ChangeKind::MessageAppended);
            self.capture(&state)
        };

        self.persistence.write(pending);
    }

    /// Deregister handlers, detach the generation, then close.
    fn teardown(&self) {
        let attached = {
            let state = self.lock();
            state
                .binding
                .as_ref()
                .map(|b| (b.generation, b.transport.clone(), b.handlers.clone()))
        };

        let Some((generation, transport, handlers)) = attached else {
            tracing::debug!("No binding attached, nothing to tear down");
            return;
        };

        for (event, handler) in &handlers {
            transport.off(event, handler);
        }

        {
            let mut state = self.lock();
            if state.is_attached(generation) {
                state.binding = None;
                self.set_status(&mut state, ConnectionStatus::Disconnected);
            }
        }

        transport.close();
        tracing::info!("Disconnected from relay (binding #{})", generation);
    }
}

/// Handlers for one binding. They hold the session weakly and do nothing once
/// the session is gone or the generation is detached.
fn bind_handlers(inner: &Arc<SessionInner>, generation: u64) -> Vec<(&'static str, EventHandler)> {
    SUBSCRIBED_EVENTS
        .into_iter()
        .map(|event| {
            let session: Weak<SessionInner> = Arc::downgrade(inner);
            let handler = handler(move |payload| {
                if let Some(session) = session.upgrade() {
                    session.on_transport_event(generation, event, payload);
                }
            });
            (event, handler)
        })
        .collect()
}

fn emit(transport: &dyn Transport, event: OutboundEvent) {
    let name = event.name();
    tracing::debug!("Emitting '{}'", name);
    transport.emit(name, event.into_payload());
}

/// Orchestrates one chat session.
///
/// All operations return immediately. Connection outcomes show up as status
/// changes, observable through [`SessionController::subscribe`].
pub struct SessionController {
    inner: Arc<SessionInner>,
}

impl SessionController {
    /// Create a session, hydrating history, room and identity from
    /// `persistence` before any connection attempt.
    pub fn new(
        factory: impl TransportFactory + 'static,
        persistence: PersistenceAdapter,
        config: ClientConfig,
    ) -> Self {
        Self::with_clock(factory, persistence, config, SystemClock)
    }

    /// Like [`SessionController::new`] with a custom clock for send timestamps.
    pub fn with_clock(
        factory: impl TransportFactory + 'static,
        persistence: PersistenceAdapter,
        config: ClientConfig,
        clock: impl Clock + 'static,
    ) -> Self {
        let hydrated = persistence.load();
        let (changes, _) = watch::channel(StateChange::initial());

        tracing::debug!(
            "Session hydrated: {} messages, room '{}', identity '{}'",
            hydrated.store.len(),
            hydrated.room.room(),
            hydrated.room.identity()
        );

        let inner = SessionInner {
            state: Mutex::new(SessionState {
                status: ConnectionStatus::Disconnected,
                room: hydrated.room,
                store: hydrated.store,
                binding: None,
                last_generation: 0,
                revision: 0,
            }),
            factory: Box::new(factory),
            persistence,
            config,
            changes,
            clock: Box::new(clock),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start connecting to the configured relay.
    ///
    /// No-op while Connecting or Connected. A binding left over from a lost
    /// connection is torn down first.
    pub fn connect(&self) {
        let inner = &self.inner;

        let stale = {
            let mut state = inner.lock();
            if state.status != ConnectionStatus::Disconnected {
                tracing::debug!("Already {}, ignoring connect", state.status);
                return;
            }
            state.binding.is_some()
        };

        if stale {
            inner.teardown();
        }

        let transport = inner.factory.create();

        let (generation, handlers) = {
            let mut state = inner.lock();
            if state.status != ConnectionStatus::Disconnected || state.binding.is_some() {
                tracing::debug!("Concurrent connect won, dropping new binding");
                return;
            }

            state.last_generation += 1;
            let generation = state.last_generation;
            let handlers = bind_handlers(inner, generation);
            state.binding = Some(Binding {
                generation,
                transport: transport.clone(),
                handlers: handlers.clone(),
            });
            inner.set_status(&mut state, ConnectionStatus::Connecting);
            (generation, handlers)
        };

        for (event, handler) in handlers {
            transport.on(event, handler);
        }

        tracing::info!(
            "Connecting to {} (binding #{})",
            inner.config.endpoint,
            generation
        );
        transport.open(&inner.config.endpoint, &inner.config.connect_options);

        // A disconnect_socket() racing with this call may have detached us
        // before open() ran.
        if !inner.lock().is_attached(generation) {
            transport.close();
        }
    }

    /// Tear down the current binding, if any. Valid from every state.
    ///
    /// After this returns no transport event can change the session.
    pub fn disconnect_socket(&self) {
        self.inner.teardown();
    }

    /// Switch rooms. Joins immediately when Connected; otherwise the join is
    /// sent on the next successful connect.
    pub fn join_room(&self, room: impl Into<String>) {
        let room = room.into();
        let (pending, transport) = {
            let mut state = self.inner.lock();
            let pending = if state.room.set_room(room.clone()) {
                tracing::info!("Room changed to '{}'", room);
                self.inner.notify(&mut state, ChangeKind::RoomChanged);
                Some(self.inner.capture(&state))
            } else {
                None
            };

            let transport = match (state.status, state.binding.as_ref()) {
                (ConnectionStatus::Connected, Some(binding)) => Some(binding.transport.clone()),
                _ => {
                    tracing::debug!("Not connected, deferring join of '{}'", room);
                    None
                }
            };
            (pending, transport)
        };

        if let Some(pending) = pending {
            self.inner.persistence.write(pending);
        }
        if let Some(transport) = transport {
            emit(transport.as_ref(), OutboundEvent::JoinRoom(room));
        }
    }

    /// Post a message to the current room as the current identity.
    ///
    /// Dropped unless Connected, and dropped when `text` is blank. The message
    /// is not added locally; it arrives back through `receive_message`.
    pub fn send_message(&self, text: &str) {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring blank message");
            return;
        }

        let outbound = {
            let state = self.inner.lock();
            match (state.status, state.binding.as_ref()) {
                (ConnectionStatus::Connected, Some(binding)) => {
                    let dto = ChatMessageDto {
                        room: state.room.room().to_string(),
                        user: state.room.identity().to_string(),
                        text: text.to_string(),
                        timestamp: timestamp_to_wire(Timestamp::new(self.inner.clock.now())),
                    };
                    Some((binding.transport.clone(), dto))
                }
                _ => {
                    tracing::debug!("Not connected ({}), dropping message", state.status);
                    None
                }
            }
        };

        if let Some((transport, dto)) = outbound {
            emit(transport.as_ref(), OutboundEvent::SendMessage(dto));
        }
    }

    /// Change the display name used for subsequent messages.
    pub fn set_identity(&self, identity: impl Into<String>) {
        let identity = identity.into();
        let pending = {
            let mut state = self.inner.lock();
            if !state.room.set_identity(identity) {
                return;
            }
            tracing::info!("Identity changed to '{}'", state.room.identity());
            self.inner.notify(&mut state, ChangeKind::IdentityChanged);
            self.inner.capture(&state)
        };

        self.inner.persistence.write(pending);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status
    }

    pub fn room(&self) -> String {
        self.inner.lock().room.room().to_string()
    }

    pub fn identity(&self) -> String {
        self.inner.lock().room.identity().to_string()
    }

    /// Current history, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().store.snapshot()
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().store.len()
    }

    /// Watch for changes. The receiver always holds the latest change.
    pub fn subscribe(&self) -> watch::Receiver<StateChange> {
        self.inner.changes.subscribe()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}
