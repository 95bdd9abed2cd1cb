//! # Cart Events
//!
//! Notifications published after a mutation has been stored.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Event Flow                                     │
//! │                                                                         │
//! │  CartSession ──► store.put(tree) ──► sink.publish(CartEvent)           │
//! │                                                                         │
//! │  cart.added          Added(item)                  add / add_many        │
//! │  cart.subitem.added  SubItemAdded(child, parent)  add_sub_item          │
//! │  cart.updated        Updated(row_id)              update                │
//! │  cart.removed        Removed(row_id)              remove, qty <= 0      │
//! │  cart.destroyed      Destroyed                    destroy               │
//! │                                                                         │
//! │  Publishing never fails a cart operation; the state is already stored. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};
use trolley_core::Item;

/// A cart mutation, as seen by listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum CartEvent {
    /// A top-level row was added or merged into.
    Added(Item),

    /// A child was attached below `parent`. `parent` reflects the new child.
    SubItemAdded { child: Item, parent: Item },

    /// Carries the row id the caller passed to `update`.
    Updated(String),

    Removed(String),

    Destroyed,
}

impl CartEvent {
    /// Event name as seen by hosts (`cart.added`, `cart.subitem.added`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            CartEvent::Added(_) => "cart.added",
            CartEvent::SubItemAdded { .. } => "cart.subitem.added",
            CartEvent::Updated(_) => "cart.updated",
            CartEvent::Removed(_) => "cart.removed",
            CartEvent::Destroyed => "cart.destroyed",
        }
    }
}

/// Receives cart events (implemented by the host).
pub trait CartEventSink: Send + Sync {
    fn publish(&self, event: CartEvent);
}

/// No-op sink for hosts that do not listen.
pub struct NoopSink;

impl CartEventSink for NoopSink {
    fn publish(&self, _event: CartEvent) {}
}

// =============================================================================
// Recording Sink
// =============================================================================

/// Keeps every event in memory. Used by tests and debugging tools.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CartEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CartEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Event names in publication order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(CartEvent::name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl CartEventSink for RecordingSink {
    fn publish(&self, event: CartEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// =============================================================================
// Tracing Sink
// =============================================================================

/// Logs each event at info level.
pub struct TracingSink;

impl CartEventSink for TracingSink {
    fn publish(&self, event: CartEvent) {
        match &event {
            CartEvent::Added(item) => {
                info!(event = event.name(), row_id = %item.row_id(), quantity = item.quantity(), "Cart event")
            }
            CartEvent::SubItemAdded { child, parent } => {
                info!(event = event.name(), row_id = %child.row_id(), parent = %parent.row_id(), "Cart event")
            }
            CartEvent::Updated(row_id) | CartEvent::Removed(row_id) => {
                info!(event = event.name(), row_id = %row_id, "Cart event")
            }
            CartEvent::Destroyed => info!(event = event.name(), "Cart event"),
        }
    }
}

// =============================================================================
// Broadcast Sink
// =============================================================================

/// Fans events out over a tokio broadcast channel.
///
/// Slow receivers lag and lose the oldest events; the cart never waits.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<CartEvent>,
}

impl BroadcastSink {
    /// Creates the sink along with a first receiver.
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<CartEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (BroadcastSink { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl CartEventSink for BroadcastSink {
    fn publish(&self, event: CartEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            debug!(event = name, "No subscribers for cart event");
        }
    }
}
