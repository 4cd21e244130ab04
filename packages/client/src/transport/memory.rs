//! In-process Transport Binding.
//!
//! Nothing leaves the process: emitted events are recorded, and inbound
//! traffic is simulated with [`InMemoryTransport::deliver`]. Delivery runs on
//! the simulating caller's stack, never on the session's.

use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use serde_json::Value;

use super::{
    ConnectOptions, EVENT_CONNECT, EVENT_DISCONNECT, Endpoint, EventHandler, HandlerRegistry,
    Transport,
};

/// One event emitted towards the relay
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub event: String,
    pub payload: Value,
}

/// Deterministic binding that records every interaction
#[derive(Default)]
pub struct InMemoryTransport {
    registry: HandlerRegistry,
    open: AtomicBool,
    connected: AtomicBool,
    open_calls: AtomicUsize,
    connections_opened: AtomicUsize,
    close_calls: AtomicUsize,
    emitted: Mutex<Vec<EmittedEvent>>,
    last_endpoint: Mutex<Option<Endpoint>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn emitted_lock(&self) -> MutexGuard<'_, Vec<EmittedEvent>> {
        self.emitted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate an inbound event from the relay.
    ///
    /// `connect` and `disconnect` also update the connected flag, as a real
    /// connection would. Returns the number of handlers invoked.
    pub fn deliver(&self, event: &str, payload: Value) -> usize {
        match event {
            EVENT_CONNECT => self.connected.store(true, Ordering::SeqCst),
            EVENT_DISCONNECT => {
                self.connected.store(false, Ordering::SeqCst);
                self.open.store(false, Ordering::SeqCst);
            }
            _ => {}
        }
        self.registry.dispatch(event, &payload)
    }

    /// Shorthand for delivering `connect`.
    pub fn simulate_connect(&self) -> usize {
        self.deliver(EVENT_CONNECT, Value::Null)
    }

    /// Shorthand for delivering `disconnect`.
    pub fn simulate_disconnect(&self) -> usize {
        self.deliver(EVENT_DISCONNECT, Value::Null)
    }

    /// Every event emitted so far, in order.
    pub fn emitted(&self) -> Vec<EmittedEvent> {
        self.emitted_lock().clone()
    }

    /// Emitted events with the given name.
    pub fn emitted_named(&self, event: &str) -> Vec<EmittedEvent> {
        self.emitted_lock()
            .iter()
            .filter(|e| e.event == event)
            .cloned()
            .collect()
    }

    /// How many times `open` was called.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// How many connections were actually established.
    pub fn connections_opened(&self) -> usize {
        self.connections_opened.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.registry.handler_count(event)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn last_endpoint(&self) -> Option<Endpoint> {
        self.last_endpoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for InMemoryTransport {
    fn open(&self, endpoint: &Endpoint, _options: &ConnectOptions) {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        if self.open.swap(true, Ordering::SeqCst) {
            tracing::debug!("In-memory transport already open, ignoring open");
            return;
        }

        self.connections_opened.fetch_add(1, Ordering::SeqCst);
        *self
            .last_endpoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(endpoint.clone());
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn on(&self, event: &str, handler: EventHandler) -> bool {
        self.registry.register(event, handler)
    }

    fn off(&self, event: &str, handler: &EventHandler) -> bool {
        self.registry.deregister(event, handler)
    }

    fn emit(&self, event: &str, payload: Value) {
        if !self.is_connected() {
            tracing::warn!("Not connected, dropping outbound '{}'", event);
            return;
        }

        self.emitted_lock().push(EmittedEvent {
            event: event.to_string(),
            payload,
        });
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
