//! World state store: connected players and in-flight projectiles

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque per-connection identifier, also the player id
pub type ConnectionId = Uuid;

/// Full player mapping as broadcast to clients
pub type Roster = BTreeMap<ConnectionId, Player>;

/// Side length of the square players spawn in
pub const SPAWN_AREA: f64 = 500.0;
/// Position delta per unit of move input
pub const MOVE_STEP: f64 = 5.0;
/// Projectile speed in units per tick
pub const PROJECTILE_SPEED: f64 = 10.0;

/// A connected player (authoritative)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: ConnectionId,
    pub username: String,
    pub x: f64,
    pub y: f64,
    /// CSS color, e.g. `hsl(210, 100%, 50%)`
    pub color: String,
    pub score: u32,
}

/// A projectile in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    /// Unique among projectiles created by this store
    pub id: u64,
    pub x: f64,
    pub y: f64,
    /// Direction of travel in radians
    pub angle: f64,
    /// Units per tick
    pub speed: f64,
    /// Player that fired it
    pub player_id: ConnectionId,
}

impl Projectile {
    /// Move one tick along the heading
    pub fn advance(&mut self) {
        self.x += self.angle.cos() * self.speed;
        self.y += self.angle.sin() * self.speed;
    }
}

/// World store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("player {0} is already registered")]
    DuplicateId(ConnectionId),

    #[error("no player registered for connection {0}")]
    UnknownPlayer(ConnectionId),
}

/// Players and projectiles, owned by a single game server task
pub struct WorldState {
    players: Roster,
    projectiles: Vec<Projectile>,
    next_projectile_id: u64,
    rng: ChaCha8Rng,
}

impl WorldState {
    /// Empty world with a seeded RNG for spawn positions and colors
    pub fn with_seed(seed: u64) -> Self {
        Self {
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            next_projectile_id: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Register a player at a random point of the spawn area
    pub fn add_player(&mut self, id: ConnectionId, username: String) -> Result<&Player, WorldError> {
        let x = self.rng.gen_range(0.0..SPAWN_AREA);
        let y = self.rng.gen_range(0.0..SPAWN_AREA);
        self.add_player_at(id, username, x, y)
    }

    /// Register a player at a fixed position
    pub fn add_player_at(
        &mut self,
        id: ConnectionId,
        username: String,
        x: f64,
        y: f64,
    ) -> Result<&Player, WorldError> {
        if self.players.contains_key(&id) {
            return Err(WorldError::DuplicateId(id));
        }

        let hue = self.rng.gen_range(0.0..360.0_f64);
        let player = Player {
            id,
            username,
            x,
            y,
            color: format!("hsl({:.0}, 100%, 50%)", hue),
            score: 0,
        };

        Ok(self.players.entry(id).or_insert(player))
    }

    /// Remove a player; projectiles they fired stay in flight
    pub fn remove_player(&mut self, id: &ConnectionId) -> Option<Player> {
        self.players.remove(id)
    }

    /// Shift a player by `(dx, dy) * MOVE_STEP`, unclamped
    pub fn move_player(&mut self, id: &ConnectionId, dx: f64, dy: f64) -> Result<&Player, WorldError> {
        let player = self
            .players
            .get_mut(id)
            .ok_or(WorldError::UnknownPlayer(*id))?;
        player.x += dx * MOVE_STEP;
        player.y += dy * MOVE_STEP;
        Ok(player)
    }

    /// Spawn a projectile at the origin player's current position
    pub fn add_projectile(&mut self, origin: &ConnectionId, angle: f64) -> Result<&Projectile, WorldError> {
        let player = self
            .players
            .get(origin)
            .ok_or(WorldError::UnknownPlayer(*origin))?;

        let projectile = Projectile {
            id: self.next_projectile_id,
            x: player.x,
            y: player.y,
            angle,
            speed: PROJECTILE_SPEED,
            player_id: *origin,
        };
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
        self.projectiles.push(projectile);

        Ok(&self.projectiles[self.projectiles.len() - 1])
    }

    pub fn player(&self, id: &ConnectionId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> &Roster {
        &self.players
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Roster copy for a `players update` broadcast
    pub fn snapshot_players(&self) -> Roster {
        self.players.clone()
    }

    /// Projectile copy for a `bullets update` broadcast
    pub fn snapshot_projectiles(&self) -> Vec<Projectile> {
        self.projectiles.clone()
    }

    /// Split borrow used by the simulation step
    pub(crate) fn parts_mut(&mut self) -> (&mut Roster, &mut Vec<Projectile>) {
        (&mut self.players, &mut self.projectiles)
    }
}
