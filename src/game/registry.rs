//! Player registry: identity, login uniqueness and spawn placement

use std::collections::HashMap;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::map::GameMap;
use super::player::{Player, PlayerId, PlayerStatus, Position, Role};

pub const LOGIN_MIN_LEN: usize = 3;
pub const LOGIN_MAX_LEN: usize = 20;

/// Registration failures, reported in check order
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Login must be {LOGIN_MIN_LEN}-{LOGIN_MAX_LEN} alphanumeric characters")]
    InvalidLogin,

    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Login already taken: {0}")]
    DuplicateLogin(String),

    #[error("No walkable spawn cell")]
    NoSpawnCell,
}

/// Lookup of an id or login that is not registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Player not found")]
pub struct NotFound;

/// Where new players appear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPolicy {
    Fixed(Position),
    Random,
}

impl Default for SpawnPolicy {
    fn default() -> Self {
        Self::Fixed(Position::new(0, 0))
    }
}

/// Picks spawn positions. Only ever hands out walkable cells.
#[derive(Debug)]
pub struct Spawner {
    policy: SpawnPolicy,
    candidates: Vec<Position>,
    rng: ChaCha8Rng,
}

impl Spawner {
    pub fn new(policy: SpawnPolicy, map: &GameMap, seed: u64) -> Self {
        let candidates = match policy {
            SpawnPolicy::Fixed(pos) if map.is_walkable(pos) => vec![pos],
            SpawnPolicy::Fixed(_) => Vec::new(),
            SpawnPolicy::Random => map.open_cells(),
        };
        Self {
            policy,
            candidates,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// `None` when the policy has no walkable cell to offer
    pub fn next_position(&mut self) -> Option<Position> {
        match self.policy {
            SpawnPolicy::Fixed(_) => self.candidates.first().copied(),
            SpawnPolicy::Random => self.candidates.choose(&mut self.rng).copied(),
        }
    }
}

pub fn is_valid_login(login: &str) -> bool {
    let len = login.chars().count();
    (LOGIN_MIN_LEN..=LOGIN_MAX_LEN).contains(&len) && login.chars().all(char::is_alphanumeric)
}

/// Owns every player of one world. Players are never removed.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    by_login: HashMap<String, PlayerId>,
    spawner: Spawner,
}

impl PlayerRegistry {
    pub fn new(spawner: Spawner) -> Self {
        Self {
            players: HashMap::new(),
            by_login: HashMap::new(),
            spawner,
        }
    }

    /// Register a new alive player at the next spawn position
    pub fn register(&mut self, login: &str, role: &str) -> Result<Player, RegistrationError> {
        if !is_valid_login(login) {
            return Err(RegistrationError::InvalidLogin);
        }
        let role: Role = role
            .parse()
            .map_err(|_| RegistrationError::InvalidRole(role.to_string()))?;
        if self.find_by_login(login).is_ok() {
            return Err(RegistrationError::DuplicateLogin(login.to_string()));
        }

        let position = self
            .spawner
            .next_position()
            .ok_or(RegistrationError::NoSpawnCell)?;

        let player = Player {
            id: PlayerId::new(),
            login: login.to_string(),
            role,
            position,
            status: PlayerStatus::Alive,
            registered_at: Utc::now(),
        };

        self.by_login.insert(player.login.clone(), player.id);
        self.players.insert(player.id, player.clone());
        Ok(player)
    }

    pub fn get(&self, id: PlayerId) -> Result<&Player, NotFound> {
        self.players.get(&id).ok_or(NotFound)
    }

    pub fn find_by_login(&self, login: &str) -> Result<&Player, NotFound> {
        self.by_login
            .get(login)
            .and_then(|id| self.players.get(id))
            .ok_or(NotFound)
    }

    /// Unchecked move; callers validate first
    pub fn set_position(&mut self, id: PlayerId, pos: Position) -> Result<(), NotFound> {
        let player = self.players.get_mut(&id).ok_or(NotFound)?;
        player.position = pos;
        Ok(())
    }

    /// Kill a player. Returns true if the status actually changed.
    pub fn mark_dead(&mut self, id: PlayerId) -> Result<bool, NotFound> {
        let player = self.players.get_mut(&id).ok_or(NotFound)?;
        let was_alive = player.is_alive();
        player.status = PlayerStatus::Dead;
        Ok(was_alive)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }
}
