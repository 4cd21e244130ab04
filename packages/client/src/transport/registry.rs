//! Event handler table shared by transport implementations.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;

use super::EventHandler;

/// Handlers registered per event name.
///
/// An (event, handler) pair is stored at most once. Dispatch clones the
/// handler list before invoking it, so handlers may register or deregister
/// while an event is being delivered.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<EventHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` if the pair was already registered.
    pub fn register(&self, event: &str, handler: EventHandler) -> bool {
        let mut handlers = self.lock();
        let entry = handlers.entry(event.to_string()).or_default();

        if entry.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            tracing::debug!("Handler for '{}' already registered, skipping", event);
            return false;
        }

        entry.push(handler);
        true
    }

    /// Returns `false` if the pair was not registered.
    pub fn deregister(&self, event: &str, handler: &EventHandler) -> bool {
        let mut handlers = self.lock();
        let Some(entry) = handlers.get_mut(event) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|existing| !Arc::ptr_eq(existing, handler));
        let removed = entry.len() != before;

        if entry.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    /// Drop every handler for every event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `event`, in registration order.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<EventHandler> = self.lock().get(event).cloned().unwrap_or_default();

        if handlers.is_empty() {
            tracing::trace!("No handler for '{}', dropping event", event);
        }

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }
}
