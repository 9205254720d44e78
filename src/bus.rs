//! Typed publish/subscribe bus for [`ParlorEvent`]s.
//!
//! Handlers run synchronously on the dispatching task, in registration
//! order: first every handler subscribed to the event's kind, then every
//! wildcard handler. A panicking handler is logged and isolated; the
//! remaining handlers still run.
//!
//! The registry lock is never held while a handler runs, so handlers may
//! freely subscribe or cancel subscriptions from inside a dispatch.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::warn;

use crate::event::{EventKind, ParlorEvent};

type Handler = Arc<dyn Fn(&ParlorEvent) + Send + Sync>;

struct Entry {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    typed: HashMap<EventKind, Vec<Entry>>,
    any: Vec<Entry>,
}

#[derive(Default)]
struct BusShared {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

/// Cheap-to-clone handle to a shared subscription registry.
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind. Returns a token that cancels
    /// the registration.
    pub(crate) fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ParlorEvent) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            handler: Arc::new(handler),
        };
        lock_registry(&self.shared).typed.entry(kind).or_default().push(entry);
        Subscription {
            shared: Arc::downgrade(&self.shared),
            kind: Some(kind),
            id,
        }
    }

    /// Register a handler that receives every event.
    pub(crate) fn subscribe_any<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ParlorEvent) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            handler: Arc::new(handler),
        };
        lock_registry(&self.shared).any.push(entry);
        Subscription {
            shared: Arc::downgrade(&self.shared),
            kind: None,
            id,
        }
    }

    /// Deliver `event` to all matching handlers.
    pub(crate) fn dispatch(&self, event: &ParlorEvent) {
        let handlers: Vec<Handler> = {
            let registry = lock_registry(&self.shared);
            let typed = registry
                .typed
                .get(&event.kind())
                .into_iter()
                .flatten()
                .map(|e| Arc::clone(&e.handler));
            let any = registry.any.iter().map(|e| Arc::clone(&e.handler));
            typed.chain(any).collect()
        };
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(kind = ?event.kind(), "event handler panicked");
            }
        }
    }

    /// Drop every registered handler.
    pub(crate) fn clear(&self) {
        let mut registry = lock_registry(&self.shared);
        registry.typed.clear();
        registry.any.clear();
    }
}

fn lock_registry(shared: &BusShared) -> std::sync::MutexGuard<'_, Registry> {
    match shared.registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Token returned by a subscription. Call [`cancel`](Self::cancel) to stop
/// receiving events; dropping the token leaves the handler registered.
pub struct Subscription {
    shared: Weak<BusShared>,
    kind: Option<EventKind>,
    id: u64,
}

impl Subscription {
    /// Remove the handler from the bus. A no-op if the client is gone or
    /// the handler was already removed.
    pub fn cancel(self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut registry = lock_registry(&shared);
        match self.kind {
            Some(kind) => {
                if let Some(entries) = registry.typed.get_mut(&kind) {
                    entries.retain(|e| e.id != self.id);
                }
            }
            None => registry.any.retain(|e| e.id != self.id),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}
