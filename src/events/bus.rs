//! # Event bus for broadcasting runtime events.
//!
//! ```text
//! Publishers (many):                   Subscriber (one):
//!   Server (init loop) ──┐
//!   Server (join loop) ──┼────► Bus ───► subscriber listener ───► SubscriberSet
//!   Server::shutdown   ──┤  (broadcast)    (spawned by run)
//!   SubscriberSet      ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks.
//! - One bounded ring buffer for all receivers; laggards observe `RecvError::Lagged(n)`.
//! - Events published while nobody listens are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
