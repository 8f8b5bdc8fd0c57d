//! The authoritative world task: owns the store, drains commands, ticks

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::util::time::{tick_duration, SIMULATION_TPS};
use crate::ws::protocol::ServerMsg;

use super::broadcast::{Broadcaster, BROADCAST_CAPACITY};
use super::handlers;
use super::simulation;
use super::world::WorldState;
use super::Command;

/// Depth of the inbound command queue shared by all connections
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Counters published by the world task for the health endpoint
#[derive(Debug, Default)]
pub struct WorldStats {
    players: AtomicUsize,
    projectiles: AtomicUsize,
    tick: AtomicU64,
}

/// Cloneable handle used by connections to reach the world task
#[derive(Clone)]
pub struct WorldHandle {
    cmd_tx: mpsc::Sender<Command>,
    broadcaster: Broadcaster,
    stats: Arc<WorldStats>,
}

impl WorldHandle {
    /// Command queue into the world; commands run in the order received
    pub fn command_sender(&self) -> mpsc::Sender<Command> {
        self.cmd_tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcaster.subscribe()
    }

    /// Open WebSocket sessions, one broadcast subscriber each
    pub fn connection_count(&self) -> usize {
        self.broadcaster.receiver_count()
    }

    pub fn player_count(&self) -> usize {
        self.stats.players.load(Ordering::Relaxed)
    }

    pub fn projectile_count(&self) -> usize {
        self.stats.projectiles.load(Ordering::Relaxed)
    }

    pub fn tick(&self) -> u64 {
        self.stats.tick.load(Ordering::Relaxed)
    }
}

/// Single owner of the world state.
///
/// Commands and ticks run one at a time on this task, so the store never
/// sees two mutations at once.
pub struct GameServer {
    world: WorldState,
    cmd_rx: mpsc::Receiver<Command>,
    broadcaster: Broadcaster,
    stats: Arc<WorldStats>,
    tick: u64,
}

impl GameServer {
    /// Create the world task and the handle connections use to reach it
    pub fn new(seed: u64) -> (Self, WorldHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let broadcaster = Broadcaster::new(BROADCAST_CAPACITY);
        let stats = Arc::new(WorldStats::default());

        let handle = WorldHandle {
            cmd_tx,
            broadcaster: broadcaster.clone(),
            stats: stats.clone(),
        };

        let server = Self {
            world: WorldState::with_seed(seed),
            cmd_rx,
            broadcaster,
            stats,
            tick: 0,
        };

        (server, handle)
    }

    /// Run until shutdown is signalled or every handle is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_rate = SIMULATION_TPS, "Game world started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.run_tick();
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        info!("All world handles dropped");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        info!(
            ticks = self.tick,
            players = self.world.players().len(),
            "Game world stopped"
        );
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Event { conn_id, msg } => {
                handlers::handle_event(&mut self.world, &self.broadcaster, conn_id, msg);
            }
            Command::Disconnect { conn_id } => {
                handlers::handle_disconnect(&mut self.world, &self.broadcaster, conn_id);
            }
        }
        self.publish_stats();
    }

    fn run_tick(&mut self) {
        self.tick += 1;
        let report = simulation::step(&mut self.world, &self.broadcaster);
        if report.hits > 0 || report.expired > 0 {
            debug!(
                tick = self.tick,
                hits = report.hits,
                expired = report.expired,
                "Projectiles resolved"
            );
        }
        self.publish_stats();
    }

    fn publish_stats(&self) {
        self.stats.players.store(self.world.players().len(), Ordering::Relaxed);
        self.stats
            .projectiles
            .store(self.world.projectiles().len(), Ordering::Relaxed);
        self.stats.tick.store(self.tick, Ordering::Relaxed);
    }
}
