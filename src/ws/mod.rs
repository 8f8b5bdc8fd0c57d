//! WebSocket transport: upgrade, sessions and wire types

pub mod handler;
pub mod protocol;
