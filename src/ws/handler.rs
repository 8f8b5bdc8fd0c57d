//! WebSocket upgrade handler

use std::fmt::Display;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Command, ConnectionId, WorldHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{self, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.world))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, world: WorldHandle) {
    let conn_id: ConnectionId = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before anything can be broadcast about this connection
    let broadcast_rx = world.subscribe();

    // Goes to this socket only, never through the broadcast
    if let Err(e) = send_msg(&mut ws_sink, &ServerMsg::Connected { id: conn_id }).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send connection id");
        return;
    }

    // Spawn writer task: broadcasts -> WebSocket
    let writer_handle = tokio::spawn(forward_broadcasts(conn_id, ws_sink, broadcast_rx));

    // Reader loop: WebSocket -> world task
    let rate_limiter = ConnectionRateLimiter::new();
    read_inbound(conn_id, ws_stream, &world.command_sender(), &rate_limiter).await;

    writer_handle.abort();
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Relay every broadcast to one client until either side goes away
async fn forward_broadcasts<S>(
    conn_id: ConnectionId,
    mut sink: S,
    mut broadcast_rx: broadcast::Receiver<ServerMsg>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        match broadcast_rx.recv().await {
            Ok(msg) => {
                if let Err(e) = send_msg(&mut sink, &msg).await {
                    debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    conn_id = %conn_id,
                    lagged_count = n,
                    "Client lagged, skipping {} events", n
                );
                // Continue - don't disconnect for lag
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(conn_id = %conn_id, "Broadcast channel closed");
                break;
            }
        }
    }
}

/// Forward decoded client events to the world until the socket closes,
/// then queue the connection's single `Disconnect`.
async fn read_inbound<S>(
    conn_id: ConnectionId,
    mut stream: S,
    commands: &mpsc::Sender<Command>,
    rate_limiter: &ConnectionRateLimiter,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match protocol::decode(&text) {
                    Ok(msg) => {
                        if commands.send(Command::Event { conn_id, msg }).await.is_err() {
                            debug!(conn_id = %conn_id, "World closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Ignoring client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    if commands.send(Command::Disconnect { conn_id }).await.is_err() {
        debug!(conn_id = %conn_id, "World closed before disconnect");
    }
}

/// Send a message over WebSocket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
