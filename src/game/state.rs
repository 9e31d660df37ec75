//! World state and the synchronized facade every caller goes through

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, error, info};

use super::clock::WorldClock;
use super::map::GameMap;
use super::movement::{DistanceMetric, MoveRejection, MovementValidator};
use super::player::{Player, PlayerId, PlayerSummary, Position};
use super::registry::{NotFound, PlayerRegistry, RegistrationError, SpawnPolicy, Spawner};
use super::vision::{SightRules, VisionEngine, VisionReport};

/// Tunable rules of one world
#[derive(Debug, Clone)]
pub struct GameRules {
    pub turn_duration: Duration,
    /// Max distance a player may cover in one move
    pub move_allowance: u32,
    pub metric: DistanceMetric,
    pub sight: SightRules,
    pub spawn: SpawnPolicy,
    /// Seed for random spawns
    pub seed: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            turn_duration: Duration::from_secs(30),
            move_allowance: 3,
            metric: DistanceMetric::default(),
            sight: SightRules::default(),
            spawn: SpawnPolicy::default(),
            seed: 0,
        }
    }
}

/// World construction errors
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Spawn point ({}, {}) is not an open cell", .0.x, .0.y)]
    SpawnBlocked(Position),

    #[error("Random spawning needs at least one open cell")]
    NoOpenCell,
}

/// Errors surfaced by the facade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Player not found")]
    NotFound,

    #[error(transparent)]
    Rejected(#[from] MoveRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<NotFound> for GameError {
    fn from(_: NotFound) -> Self {
        GameError::NotFound
    }
}

/// Everything one game owns. Not synchronized; see `GameState`.
#[derive(Debug)]
pub struct World {
    map: GameMap,
    registry: PlayerRegistry,
    clock: WorldClock,
    validator: MovementValidator,
    vision: VisionEngine,
}

impl World {
    pub fn new(map: GameMap, rules: GameRules) -> Result<Self, WorldError> {
        match rules.spawn {
            SpawnPolicy::Fixed(pos) if !map.is_walkable(pos) => {
                return Err(WorldError::SpawnBlocked(pos));
            }
            SpawnPolicy::Random if map.open_cells().is_empty() => {
                return Err(WorldError::NoOpenCell);
            }
            _ => {}
        }

        let spawner = Spawner::new(rules.spawn, &map, rules.seed);
        Ok(Self {
            registry: PlayerRegistry::new(spawner),
            clock: WorldClock::new(rules.turn_duration),
            validator: MovementValidator::new(rules.move_allowance, rules.metric),
            vision: VisionEngine::new(rules.sight),
            map,
        })
    }
}

/// What a player sees at one instant
#[derive(Debug, Clone)]
pub struct Vision {
    /// The viewer's own record, role included
    pub viewer: Player,
    pub report: VisionReport,
    pub map_width: i32,
    pub map_height: i32,
    pub current_turn: u64,
    pub time_remaining: Duration,
}

impl Vision {
    pub fn eliminated(&self) -> bool {
        !self.viewer.is_alive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockStatus {
    pub current_turn: u64,
    pub turn_started_at: DateTime<Utc>,
    pub time_remaining: Duration,
    pub turn_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldStats {
    pub players: usize,
    pub alive: usize,
    pub current_turn: u64,
}

/// Single entry point into one world.
///
/// Every mutation (register, move, elimination, turn advance) runs as one
/// transaction under the write lock, so a move validated against turn N can
/// never land after the clock moved to N + 1. Reads share the read lock and
/// never observe a half-applied move.
#[derive(Debug)]
pub struct GameState {
    world: RwLock<World>,
}

impl GameState {
    pub fn new(world: World) -> Self {
        Self {
            world: RwLock::new(world),
        }
    }

    pub fn register(&self, login: &str, role: &str) -> Result<Player, GameError> {
        let mut world = self.world.write();
        let player = world.registry.register(login, role).map_err(|e| {
            debug!(login, error = %e, "Registration refused");
            e
        })?;

        info!(
            player_id = %player.id,
            login = %player.login,
            x = player.position.x,
            y = player.position.y,
            "Player registered"
        );
        Ok(player)
    }

    pub fn player(&self, id: PlayerId) -> Result<Player, GameError> {
        Ok(self.world.read().registry.get(id)?.clone())
    }

    /// Validate and apply a move. `turn: None` means the current turn.
    pub fn move_player(
        &self,
        id: PlayerId,
        dest: Position,
        turn: Option<u64>,
    ) -> Result<Position, GameError> {
        let mut world = self.world.write();
        let current_turn = world.clock.current_turn();
        let player = world.registry.get(id)?;

        if !world.map.is_walkable(player.position) {
            error!(
                player_id = %id,
                x = player.position.x,
                y = player.position.y,
                "Stored position is not walkable"
            );
            return Err(GameError::Internal(format!(
                "player {id} stands on an invalid cell"
            )));
        }

        let requested_turn = turn.unwrap_or(current_turn);
        if let Err(rejection) =
            world
                .validator
                .validate(&world.map, player, dest, requested_turn, current_turn)
        {
            debug!(player_id = %id, x = dest.x, y = dest.y, reason = %rejection, "Move rejected");
            return Err(rejection.into());
        }

        world.registry.set_position(id, dest)?;
        info!(player_id = %id, x = dest.x, y = dest.y, turn = current_turn, "Player moved");
        Ok(dest)
    }

    pub fn vision(&self, id: PlayerId) -> Result<Vision, GameError> {
        let world = self.world.read();
        let viewer = world.registry.get(id)?;
        let report = world.vision.compute(&world.map, viewer, world.registry.iter());

        debug!(
            player_id = %id,
            cells = report.cells.len(),
            players = report.players.len(),
            "Vision computed"
        );

        Ok(Vision {
            viewer: viewer.clone(),
            report,
            map_width: world.map.width(),
            map_height: world.map.height(),
            current_turn: world.clock.current_turn(),
            time_remaining: world.clock.time_remaining(),
        })
    }

    /// External elimination event. Idempotent.
    pub fn mark_dead(&self, id: PlayerId) -> Result<PlayerSummary, GameError> {
        let mut world = self.world.write();
        if world.registry.mark_dead(id)? {
            info!(player_id = %id, turn = world.clock.current_turn(), "Player eliminated");
        }
        Ok(world.registry.get(id)?.summary())
    }

    /// Start the next turn; called by the turn driver only
    pub fn advance_turn(&self) -> u64 {
        self.world.write().clock.advance()
    }

    pub fn current_turn(&self) -> u64 {
        self.world.read().clock.current_turn()
    }

    pub fn turn_duration(&self) -> Duration {
        self.world.read().clock.turn_duration()
    }

    pub fn clock_status(&self) -> ClockStatus {
        let world = self.world.read();
        ClockStatus {
            current_turn: world.clock.current_turn(),
            turn_started_at: world.clock.turn_started_at(),
            time_remaining: world.clock.time_remaining(),
            turn_duration: world.clock.turn_duration(),
        }
    }

    pub fn stats(&self) -> WorldStats {
        let world = self.world.read();
        WorldStats {
            players: world.registry.len(),
            alive: world.registry.alive_count(),
            current_turn: world.clock.current_turn(),
        }
    }

    /// Test hook: put a player somewhere without validation
    #[cfg(test)]
    pub(crate) fn force_position(&self, id: PlayerId, pos: Position) {
        let _ = self.world.write().registry.set_position(id, pos);
    }
}
