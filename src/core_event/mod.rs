//! Transfer-completed announcements, fanned out to any interested task.

use crate::constants::EVENT_BUS_CAPACITY;
use crate::core_channel::negotiator::{ReprType, TransferDirection};
use std::net::SocketAddr;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub direction: TransferDirection,
    pub path: String,
    pub username: String,
    pub node: String,
    /// Data-channel peer actually used, when the transfer got that far.
    pub peer: Option<SocketAddr>,
    pub repr_type: ReprType,
    pub bytes: u64,
    pub success: bool,
    /// Whether the reconciler verdict was clean.
    pub clean: bool,
}

pub struct EventBus {
    tx: broadcast::Sender<TransferEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.tx.subscribe()
    }

    /// Lagging or absent subscribers never block a session.
    pub fn publish(&self, event: TransferEvent) {
        let _ = self.tx.send(event);
    }
}
