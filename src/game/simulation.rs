//! Fixed-tick projectile simulation and hit detection

use tracing::{debug, info};

use crate::ws::protocol::ServerMsg;

use super::broadcast::Broadcaster;
use super::world::{ConnectionId, Projectile, Roster, WorldState};

/// A projectile closer than this to a player hits them
pub const HIT_RADIUS: f64 = 20.0;
/// Projectiles leaving `[0, ARENA_SIZE]` on either axis expire
pub const ARENA_SIZE: f64 = 2000.0;

/// What happened during one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub hits: usize,
    pub expired: usize,
}

/// Advance every projectile, resolve hits and expiry, then broadcast
/// the surviving projectiles.
///
/// Projectiles are processed in spawn order. A projectile hits at most
/// one player: the first non-shooter within `HIT_RADIUS`, in roster
/// (player id) order. Hit events go out before the tick's `bullets update`.
pub fn step(world: &mut WorldState, out: &Broadcaster) -> StepReport {
    let mut report = StepReport::default();
    let mut events = Vec::new();

    let (players, projectiles) = world.parts_mut();
    projectiles.retain_mut(|projectile| {
        projectile.advance();

        if let Some(victim_id) = find_victim(players, projectile) {
            credit_hit(players, projectile, victim_id, &mut events);
            report.hits += 1;
            return false;
        }

        if out_of_bounds(projectile) {
            report.expired += 1;
            return false;
        }

        true
    });

    for event in events {
        out.emit_all(event);
    }
    out.emit_all(ServerMsg::BulletsUpdate(world.snapshot_projectiles()));

    report
}

/// First player other than the shooter inside the hit radius
fn find_victim(players: &Roster, projectile: &Projectile) -> Option<ConnectionId> {
    players
        .values()
        .filter(|p| p.id != projectile.player_id)
        .find(|p| (p.x - projectile.x).hypot(p.y - projectile.y) < HIT_RADIUS)
        .map(|p| p.id)
}

/// Score the hit for the shooter. A shooter who already left earns nothing
/// and no hit events are sent.
fn credit_hit(
    players: &mut Roster,
    projectile: &Projectile,
    victim_id: ConnectionId,
    events: &mut Vec<ServerMsg>,
) {
    let Some(shooter) = players.get_mut(&projectile.player_id) else {
        debug!(
            projectile_id = projectile.id,
            shooter_id = %projectile.player_id,
            victim_id = %victim_id,
            "Hit from departed shooter, not credited"
        );
        return;
    };

    shooter.score += 1;
    info!(
        projectile_id = projectile.id,
        shooter_id = %shooter.id,
        victim_id = %victim_id,
        score = shooter.score,
        "Player hit"
    );

    events.push(ServerMsg::ScoreUpdate {
        player_id: shooter.id,
        score: shooter.score,
    });
    events.push(ServerMsg::PlayerHit {
        player_id: victim_id,
        shooter_name: shooter.username.clone(),
    });
}

fn out_of_bounds(projectile: &Projectile) -> bool {
    !(0.0..=ARENA_SIZE).contains(&projectile.x) || !(0.0..=ARENA_SIZE).contains(&projectile.y)
}
