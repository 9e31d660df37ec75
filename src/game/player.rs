//! Player records and the value types they are built from

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque player identifier, assigned once at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Roles available in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Predator, sees farther
    #[serde(rename = "loup")]
    Werewolf,
    #[serde(rename = "villageois")]
    Villager,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Werewolf => "loup",
            Role::Villager => "villageois",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loup" => Ok(Role::Werewolf),
            "villageois" => Ok(Role::Villager),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Life status; only ever moves from alive to dead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    #[serde(rename = "vivant")]
    Alive,
    #[serde(rename = "mort")]
    Dead,
}

/// Integer grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// King-move distance: max of the axis deltas
    pub fn chebyshev_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn manhattan_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Squared Euclidean distance, exact in integers
    pub fn distance_sq(self, other: Position) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// Authoritative player record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub login: String,
    pub role: Role,
    pub position: Position,
    pub status: PlayerStatus,
    pub registered_at: DateTime<Utc>,
}

impl Player {
    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }

    /// What other players are allowed to learn about this one
    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            login: self.login.clone(),
            position: self.position,
            status: self.status,
        }
    }
}

/// Public view of a player. Never carries a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub login: String,
    pub position: Position,
    pub status: PlayerStatus,
}
