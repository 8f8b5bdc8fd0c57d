//! Command handlers: one per inbound client event
//!
//! A handler that cannot find the sender's player does nothing. Stale
//! events from connections that never joined (or already left) are normal.

use tracing::{debug, info, warn};

use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::broadcast::Broadcaster;
use super::world::{ConnectionId, WorldError, WorldState};

/// Author of server-generated chat lines
pub const SYSTEM_USERNAME: &str = "System";

/// Route a decoded client event to its handler
pub fn handle_event(world: &mut WorldState, out: &Broadcaster, conn_id: ConnectionId, msg: ClientMsg) {
    match msg {
        ClientMsg::Join(username) => handle_join(world, out, conn_id, username),
        ClientMsg::Move { x, y } => handle_move(world, out, conn_id, x, y),
        ClientMsg::Shoot { angle } => handle_shoot(world, conn_id, angle),
        ClientMsg::Chat(message) => handle_chat(world, out, conn_id, message),
    }
}

/// Register a player, then announce the new roster and a system greeting
pub fn handle_join(world: &mut WorldState, out: &Broadcaster, conn_id: ConnectionId, username: String) {
    match world.add_player(conn_id, username) {
        Ok(player) => {
            info!(
                conn_id = %conn_id,
                username = %player.username,
                x = player.x,
                y = player.y,
                "Player joined"
            );
            let message = format!("{} joined the game!", player.username);

            out.emit_all(ServerMsg::PlayersUpdate(world.snapshot_players()));
            out.emit_all(system_message(message));
        }
        Err(e) => warn!(conn_id = %conn_id, error = %e, "Ignoring join"),
    }
}

/// Shift the sender by the requested direction and announce the roster
pub fn handle_move(world: &mut WorldState, out: &Broadcaster, conn_id: ConnectionId, x: f64, y: f64) {
    match world.move_player(&conn_id, x, y) {
        Ok(_) => out.emit_all(ServerMsg::PlayersUpdate(world.snapshot_players())),
        Err(e) => ignore_unknown(conn_id, "move", e),
    }
}

/// Spawn a projectile; the next tick broadcasts it
pub fn handle_shoot(world: &mut WorldState, conn_id: ConnectionId, angle: f64) {
    match world.add_projectile(&conn_id, angle) {
        Ok(projectile) => debug!(conn_id = %conn_id, projectile_id = projectile.id, angle, "Shot fired"),
        Err(e) => ignore_unknown(conn_id, "shoot", e),
    }
}

/// Relay a chat line under the sender's username
pub fn handle_chat(world: &mut WorldState, out: &Broadcaster, conn_id: ConnectionId, message: String) {
    let Some(player) = world.player(&conn_id) else {
        ignore_unknown(conn_id, "chat message", WorldError::UnknownPlayer(conn_id));
        return;
    };

    out.emit_all(ServerMsg::ChatMessage {
        username: player.username.clone(),
        message,
    });
}

/// Announce the departure, drop the player and announce the roster
pub fn handle_disconnect(world: &mut WorldState, out: &Broadcaster, conn_id: ConnectionId) {
    let Some(username) = world.player(&conn_id).map(|p| p.username.clone()) else {
        debug!(conn_id = %conn_id, "Connection closed without joining");
        return;
    };

    out.emit_all(system_message(format!("{} left the game.", username)));
    world.remove_player(&conn_id);
    out.emit_all(ServerMsg::PlayersUpdate(world.snapshot_players()));

    info!(conn_id = %conn_id, username = %username, "Player left");
}

fn system_message(message: String) -> ServerMsg {
    ServerMsg::ChatMessage {
        username: SYSTEM_USERNAME.to_string(),
        message,
    }
}

fn ignore_unknown(conn_id: ConnectionId, event: &'static str, error: WorldError) {
    debug!(conn_id = %conn_id, event, error = %error, "Ignoring event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::broadcast::drain;
    use uuid::Uuid;

    fn setup() -> (WorldState, Broadcaster, tokio::sync::broadcast::Receiver<ServerMsg>) {
        let out = Broadcaster::new(1024);
        let rx = out.subscribe();
        (WorldState::with_seed(11), out, rx)
    }

    #[test]
    fn join_broadcasts_roster_then_greeting() {
        let (mut world, out, mut rx) = setup();
        let id = Uuid::new_v4();

        handle_event(&mut world, &out, id, ClientMsg::Join("alice".into()));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        match &events[0] {
            ServerMsg::PlayersUpdate(roster) => {
                assert_eq!(roster.len(), 1);
                assert_eq!(roster[&id].username, "alice");
            }
            other => panic!("expected roster, got {other:?}"),
        }
        assert_eq!(events[1], system_message("alice joined the game!".into()));
    }

    #[test]
    fn second_join_on_same_connection_is_ignored() {
        let (mut world, out, mut rx) = setup();
        let id = Uuid::new_v4();

        handle_join(&mut world, &out, id, "alice".into());
        drain(&mut rx);
        handle_join(&mut world, &out, id, "alice again".into());

        assert!(drain(&mut rx).is_empty());
        assert_eq!(world.player(&id).unwrap().username, "alice");
    }

    #[test]
    fn move_updates_position_and_roster() {
        let (mut world, out, mut rx) = setup();
        let id = Uuid::new_v4();
        world.add_player_at(id, "alice".into(), 100.0, 100.0).unwrap();

        handle_event(&mut world, &out, id, ClientMsg::Move { x: 1.0, y: -1.0 });

        let events = drain(&mut rx);
        assert_eq!(events, vec![ServerMsg::PlayersUpdate(world.snapshot_players())]);
        let player = world.player(&id).unwrap();
        assert_eq!((player.x, player.y), (105.0, 95.0));
    }

    #[test]
    fn replayed_moves_sum_to_final_positions() {
        let (mut world, out, _rx) = setup();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let gone = Uuid::new_v4();
        world.add_player_at(a, "a".into(), 0.0, 0.0).unwrap();
        world.add_player_at(b, "b".into(), 50.0, 50.0).unwrap();
        world.add_player_at(gone, "gone".into(), 0.0, 0.0).unwrap();

        let moves = [(a, 1.0, 0.0), (b, 0.0, 1.0), (gone, 1.0, 1.0), (a, 1.0, -1.0), (b, -0.5, 0.0)];
        for (id, x, y) in moves {
            handle_move(&mut world, &out, id, x, y);
        }
        handle_disconnect(&mut world, &out, gone);
        // Moves after leaving are stale
        handle_move(&mut world, &out, gone, 1.0, 1.0);

        let roster = world.players();
        assert_eq!(roster.len(), 2);
        assert_eq!((roster[&a].x, roster[&a].y), (10.0, -5.0));
        assert_eq!((roster[&b].x, roster[&b].y), (47.5, 55.0));
    }

    #[test]
    fn large_moves_keep_small_deltas() {
        let (mut world, out, _rx) = setup();
        let id = Uuid::new_v4();
        world.add_player_at(id, "speedy".into(), 0.0, 0.0).unwrap();

        handle_move(&mut world, &out, id, 6_710_886.4, 0.0);
        handle_move(&mut world, &out, id, 1.0, 0.0);

        let x = world.player(&id).unwrap().x;
        assert_eq!(x, 6_710_886.4 * 5.0 + 5.0);
        assert!(x > 33_554_436.5);
    }

    #[test]
    fn shoot_spawns_projectile_without_broadcast() {
        let (mut world, out, mut rx) = setup();
        let id = Uuid::new_v4();
        world.add_player_at(id, "alice".into(), 5.0, 6.0).unwrap();

        handle_event(&mut world, &out, id, ClientMsg::Shoot { angle: 1.0 });

        assert!(drain(&mut rx).is_empty());
        assert_eq!(world.projectiles().len(), 1);
        assert_eq!(world.projectiles()[0].player_id, id);
    }

    #[test]
    fn chat_is_relayed_under_username() {
        let (mut world, out, mut rx) = setup();
        let id = Uuid::new_v4();
        world.add_player_at(id, "alice".into(), 0.0, 0.0).unwrap();

        handle_event(&mut world, &out, id, ClientMsg::Chat("hello".into()));

        assert_eq!(
            drain(&mut rx),
            vec![ServerMsg::ChatMessage {
                username: "alice".into(),
                message: "hello".into(),
            }]
        );
    }

    #[test]
    fn unknown_sender_events_are_silent_noops() {
        let (mut world, out, mut rx) = setup();
        let stranger = Uuid::new_v4();

        handle_event(&mut world, &out, stranger, ClientMsg::Move { x: 1.0, y: 1.0 });
        handle_event(&mut world, &out, stranger, ClientMsg::Shoot { angle: 0.0 });
        handle_event(&mut world, &out, stranger, ClientMsg::Chat("psst".into()));
        handle_disconnect(&mut world, &out, stranger);

        assert!(drain(&mut rx).is_empty());
        assert!(world.players().is_empty());
        assert!(world.projectiles().is_empty());
    }

    #[test]
    fn disconnect_announces_then_removes() {
        let (mut world, out, mut rx) = setup();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        world.add_player_at(alice, "alice".into(), 0.0, 0.0).unwrap();
        world.add_player_at(bob, "bob".into(), 0.0, 0.0).unwrap();
        world.add_projectile(&alice, 0.0).unwrap();

        handle_disconnect(&mut world, &out, alice);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], system_message("alice left the game.".into()));
        match &events[1] {
            ServerMsg::PlayersUpdate(roster) => {
                assert!(!roster.contains_key(&alice));
                assert!(roster.contains_key(&bob));
            }
            other => panic!("expected roster, got {other:?}"),
        }
        // Projectiles outlive their shooter
        assert_eq!(world.projectiles().len(), 1);
    }
}
