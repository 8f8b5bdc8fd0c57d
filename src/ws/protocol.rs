//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON text message shaped as a named event:
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::world::{Projectile, Roster};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMsg {
    /// Register as a player under a display name
    #[serde(rename = "join", alias = "new player")]
    Join(String),

    /// Nudge own position by a unit direction
    #[serde(rename = "move")]
    Move {
        /// Horizontal direction, typically -1.0..=1.0
        x: f64,
        /// Vertical direction, typically -1.0..=1.0
        y: f64,
    },

    /// Fire a projectile from the current position
    #[serde(rename = "shoot")]
    Shoot {
        /// Direction of travel in radians
        angle: f64,
    },

    /// Say something in the shared chat
    #[serde(rename = "chat message")]
    Chat(String),
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMsg {
    /// Sent once to a fresh connection, carries its player id
    #[serde(rename = "connected")]
    Connected { id: Uuid },

    /// Full roster, keyed by player id
    #[serde(rename = "players update")]
    PlayersUpdate(Roster),

    /// Chat line from a player or from the system
    #[serde(rename = "chat message")]
    ChatMessage { username: String, message: String },

    /// Every live projectile, sent once per tick
    #[serde(rename = "bullets update")]
    BulletsUpdate(Vec<Projectile>),

    /// Shooter's new score after a hit
    #[serde(rename = "score update")]
    ScoreUpdate {
        #[serde(rename = "playerId")]
        player_id: Uuid,
        score: u32,
    },

    /// A player was hit
    #[serde(rename = "player hit")]
    PlayerHit {
        /// The player that got hit
        #[serde(rename = "playerId")]
        player_id: Uuid,
        #[serde(rename = "shooterName")]
        shooter_name: String,
    },
}

impl ServerMsg {
    /// Wire name of the event, used for logging
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMsg::Connected { .. } => "connected",
            ServerMsg::PlayersUpdate(_) => "players update",
            ServerMsg::ChatMessage { .. } => "chat message",
            ServerMsg::BulletsUpdate(_) => "bullets update",
            ServerMsg::ScoreUpdate { .. } => "score update",
            ServerMsg::PlayerHit { .. } => "player hit",
        }
    }
}

/// Why an inbound frame was rejected
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode and validate an inbound text frame.
///
/// Fails closed: anything that does not match a known event shape is
/// rejected instead of leaking half-parsed values into the world. JSON has
/// no NaN or infinity and out-of-range numbers fail to parse, so every
/// accepted number is finite.
pub fn decode(text: &str) -> Result<ClientMsg, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::Player;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn decodes_every_client_event() {
        assert_eq!(
            decode(r#"{"event":"join","data":"alice"}"#).unwrap(),
            ClientMsg::Join("alice".into())
        );
        assert_eq!(
            decode(r#"{"event":"new player","data":"bob"}"#).unwrap(),
            ClientMsg::Join("bob".into())
        );
        assert_eq!(
            decode(r#"{"event":"move","data":{"x":1,"y":-0.5}}"#).unwrap(),
            ClientMsg::Move { x: 1.0, y: -0.5 }
        );
        assert_eq!(
            decode(r#"{"event":"shoot","data":{"angle":1.25}}"#).unwrap(),
            ClientMsg::Shoot { angle: 1.25 }
        );
        assert_eq!(
            decode(r#"{"event":"chat message","data":"gg"}"#).unwrap(),
            ClientMsg::Chat("gg".into())
        );
    }

    #[test]
    fn rejects_malformed_events() {
        for text in [
            "not json",
            r#"{"event":"move","data":{"x":1}}"#,
            r#"{"event":"move","data":{"x":"fast","y":0}}"#,
            r#"{"event":"shoot","data":{}}"#,
            r#"{"event":"join","data":42}"#,
            r#"{"event":"teleport","data":{"x":0,"y":0}}"#,
            r#"{"data":"alice"}"#,
        ] {
            assert!(
                matches!(decode(text), Err(DecodeError::Malformed(_))),
                "accepted {text}"
            );
        }
    }

    #[test]
    fn accepts_large_finite_numbers() {
        assert_eq!(
            decode(r#"{"event":"move","data":{"x":1e39,"y":0}}"#).unwrap(),
            ClientMsg::Move { x: 1e39, y: 0.0 }
        );
    }

    #[test]
    fn rejects_numbers_beyond_double_range() {
        let text = r#"{"event":"shoot","data":{"angle":1e400}}"#;
        assert!(matches!(decode(text), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn server_events_use_wire_names() {
        let id = Uuid::new_v4();

        let msg = ServerMsg::ScoreUpdate { player_id: id, score: 3 };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"event": "score update", "data": {"playerId": id, "score": 3}})
        );

        let msg = ServerMsg::PlayerHit {
            player_id: id,
            shooter_name: "alice".into(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"event": "player hit", "data": {"playerId": id, "shooterName": "alice"}})
        );

        let msg = ServerMsg::ChatMessage {
            username: "System".into(),
            message: "hi".into(),
        };
        assert_eq!(msg.event_name(), "chat message");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"event": "chat message", "data": {"username": "System", "message": "hi"}})
        );
    }

    #[test]
    fn roster_is_keyed_by_player_id() {
        let id = Uuid::new_v4();
        let mut roster = BTreeMap::new();
        roster.insert(
            id,
            Player {
                id,
                username: "alice".into(),
                x: 1.0,
                y: 2.0,
                color: "hsl(120, 100%, 50%)".into(),
                score: 0,
            },
        );

        let value = serde_json::to_value(ServerMsg::PlayersUpdate(roster)).unwrap();
        assert_eq!(value["event"], "players update");
        assert_eq!(value["data"][id.to_string()]["username"], "alice");
        assert_eq!(value["data"][id.to_string()]["score"], 0);
    }
}
