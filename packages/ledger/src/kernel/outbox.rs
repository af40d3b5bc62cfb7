//! Post-commit event outbox.
//!
//! Commands queue events on their transaction; the engine publishes them here
//! only after the commit succeeded. Consumers (the notification dispatcher)
//! read from the receiving half on their own task.
//!
//! # Usage
//!
//!   let (outbox, rx) = EventOutbox::channel();
//!   outbox.publish(committed.events);

use tokio::sync::mpsc;
use tracing::warn;

use crate::domains::notifications::LedgerEvent;

pub type EventReceiver = mpsc::UnboundedReceiver<LedgerEvent>;

/// Cloneable sending half of the outbox.
#[derive(Clone)]
pub struct EventOutbox {
    tx: mpsc::UnboundedSender<LedgerEvent>,
}

impl EventOutbox {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish committed events. Never fails the caller: a closed consumer
    /// only costs the notifications.
    pub fn publish(&self, events: impl IntoIterator<Item = LedgerEvent>) {
        for event in events {
            if let Err(e) = self.tx.send(event) {
                warn!(event = ?e.0, "Event outbox closed, dropping event");
            }
        }
    }
}
