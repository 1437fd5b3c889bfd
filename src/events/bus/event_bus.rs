// src/events/bus/event_bus.rs
//
// Core event bus implementation.
//
// DESIGN PRINCIPLES:
// 1. Synchronous - handlers execute immediately in subscription order
// 2. Observable - every emission is logged
// 3. Type-safe - events are strongly typed
// 4. Re-entrant - handlers run outside the registry lock, so they may emit,
//    subscribe or drop subscriptions

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::events::types::DomainEvent;

/// Type-erased event handler function
type EventHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

type HandlerMap = HashMap<TypeId, Vec<(u64, EventHandler)>>;

/// Maximum number of entries kept in the emission log
const EVENT_LOG_CAPACITY: usize = 1024;

/// The Event Bus
///
/// Central coordination point for domain events. Services emit facts;
/// listeners subscribe per event type without the emitter knowing them.
pub struct EventBus {
    handlers: Arc<RwLock<HandlerMap>>,
    event_log: Arc<RwLock<VecDeque<EventLogEntry>>>,
    next_id: Arc<AtomicU64>,
}

/// A logged event for debugging and tracing
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub event_type: String,
    pub event_id: String,
    pub occurred_at: String,
    pub handler_count: usize,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping it removes the handler. Use [`Subscription::detach`] to keep the
/// handler registered for the lifetime of the bus.
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    handlers: Weak<RwLock<HandlerMap>>,
    type_id: TypeId,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Keep the handler registered without holding the guard.
    pub fn detach(mut self) {
        self.active = false;
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(handlers) = self.handlers.upgrade() {
            let mut handlers = handlers.write();
            if let Some(list) = handlers.get_mut(&self.type_id) {
                list.retain(|(id, _)| *id != self.id);
                if list.is_empty() {
                    handlers.remove(&self.type_id);
                }
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_log: Arc::new(RwLock::new(VecDeque::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to a specific event type
    ///
    /// Handlers are executed in the order they are subscribed.
    ///
    /// ```ignore
    /// let _sub = bus.subscribe::<FileUserDataChanged, _>(|event| {
    ///     log::info!("file {} changed", event.file_id);
    /// });
    /// ```
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: DomainEvent + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let wrapped: EventHandler = Arc::new(move |event_any: &dyn Any| {
            if let Some(event) = event_any.downcast_ref::<E>() {
                handler(event);
            } else {
                log::error!(
                    "Failed to downcast event in handler for {}",
                    std::any::type_name::<E>()
                );
            }
        });

        self.handlers
            .write()
            .entry(type_id)
            .or_default()
            .push((id, wrapped));

        Subscription {
            handlers: Arc::downgrade(&self.handlers),
            type_id,
            id,
            active: true,
        }
    }

    /// Emit an event
    ///
    /// Handlers run synchronously on the caller's thread. A panicking
    /// handler is caught and logged; the remaining handlers still run.
    pub fn emit<E>(&self, event: E)
    where
        E: DomainEvent + 'static,
    {
        let type_id = TypeId::of::<E>();

        // Snapshot so handlers can touch the bus without deadlocking
        let snapshot: Vec<EventHandler> = self
            .handlers
            .read()
            .get(&type_id)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        let entry = EventLogEntry {
            event_type: event.event_type().to_string(),
            event_id: event.event_id().to_string(),
            occurred_at: event.occurred_at().to_rfc3339(),
            handler_count: snapshot.len(),
        };

        log::debug!(
            "[EVENT] {} (id: {}) | {} handlers",
            entry.event_type,
            entry.event_id,
            entry.handler_count
        );

        {
            let mut log = self.event_log.write();
            if log.len() == EVENT_LOG_CAPACITY {
                log.pop_front();
            }
            log.push_back(entry);
        }

        for (idx, handler) in snapshot.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(&event as &dyn Any);
            }));

            if let Err(e) = result {
                log::error!(
                    "Handler {} for {} panicked: {:?}",
                    idx,
                    event.event_type(),
                    e
                );
            }
        }
    }

    /// Get the event log (for debugging)
    pub fn get_event_log(&self) -> Vec<EventLogEntry> {
        self.event_log.read().iter().cloned().collect()
    }

    pub fn clear_event_log(&self) {
        self.event_log.write().clear();
    }

    /// Get the number of subscribers for a specific event type
    pub fn subscriber_count<E>(&self) -> usize
    where
        E: 'static,
    {
        let type_id = TypeId::of::<E>();
        self.handlers
            .read()
            .get(&type_id)
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same registry
impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            event_log: Arc::clone(&self.event_log),
            next_id: Arc::clone(&self.next_id),
        }
    }
}
