//! Fan-out of server events to every connected client

use tokio::sync::broadcast;
use tracing::trace;

use crate::ws::protocol::ServerMsg;

/// Default channel depth per subscriber, about two seconds of ticks
pub const BROADCAST_CAPACITY: usize = 128;

/// Emit-to-all primitive shared by command handlers and the tick loop.
///
/// Each WebSocket session subscribes once and forwards what it receives.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<ServerMsg>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send an event to every subscriber. Nobody listening is fine.
    pub fn emit_all(&self, msg: ServerMsg) {
        let event = msg.event_name();
        match self.tx.send(msg) {
            Ok(receivers) => trace!(event, receivers, "Broadcast"),
            Err(_) => trace!(event, "Broadcast with no receivers"),
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BROADCAST_CAPACITY)
    }
}

#[cfg(test)]
pub(crate) fn drain(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}
