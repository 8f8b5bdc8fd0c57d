//! Game simulation modules

pub mod broadcast;
pub mod handlers;
pub mod server;
pub mod simulation;
pub mod world;

pub use server::{GameServer, WorldHandle};
pub use world::ConnectionId;

use crate::ws::protocol::ClientMsg;

/// Work item for the world task, produced by WebSocket sessions
#[derive(Debug, Clone)]
pub enum Command {
    /// A decoded client event
    Event { conn_id: ConnectionId, msg: ClientMsg },
    /// The connection closed
    Disconnect { conn_id: ConnectionId },
}
