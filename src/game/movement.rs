//! Movement legality rules

use std::str::FromStr;

use super::map::GameMap;
use super::player::{Player, Position};

/// How per-turn movement distance is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Diagonal steps cost the same as straight ones
    #[default]
    Chebyshev,
    Manhattan,
}

impl DistanceMetric {
    pub fn distance(self, from: Position, to: Position) -> u32 {
        match self {
            DistanceMetric::Chebyshev => from.chebyshev_distance(to),
            DistanceMetric::Manhattan => from.manhattan_distance(to),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chebyshev" => Ok(Self::Chebyshev),
            "manhattan" => Ok(Self::Manhattan),
            _ => Err(()),
        }
    }
}

/// Why a move was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("Player is dead")]
    DeadPlayer,

    #[error("Move is for turn {requested}, current turn is {current}")]
    StaleTurn { requested: u64, current: u64 },

    #[error("Destination is outside the map")]
    OutOfBounds,

    #[error("Destination is an obstacle")]
    Blocked,

    #[error("Destination is {distance} cells away, allowance is {allowance}")]
    TooFar { distance: u32, allowance: u32 },
}

impl MoveRejection {
    pub fn code(&self) -> &'static str {
        match self {
            MoveRejection::DeadPlayer => "DeadPlayer",
            MoveRejection::StaleTurn { .. } => "StaleTurn",
            MoveRejection::OutOfBounds => "OutOfBounds",
            MoveRejection::Blocked => "Blocked",
            MoveRejection::TooFar { .. } => "TooFar",
        }
    }
}

/// Stateless move checker. Never mutates anything, so it can run under a
/// read lock or in isolation.
#[derive(Debug, Clone, Copy)]
pub struct MovementValidator {
    pub allowance: u32,
    pub metric: DistanceMetric,
}

impl MovementValidator {
    pub fn new(allowance: u32, metric: DistanceMetric) -> Self {
        Self { allowance, metric }
    }

    /// Check a move; the first failing rule wins
    pub fn validate(
        &self,
        map: &GameMap,
        player: &Player,
        dest: Position,
        requested_turn: u64,
        current_turn: u64,
    ) -> Result<(), MoveRejection> {
        if !player.is_alive() {
            return Err(MoveRejection::DeadPlayer);
        }
        if requested_turn != current_turn {
            return Err(MoveRejection::StaleTurn {
                requested: requested_turn,
                current: current_turn,
            });
        }
        if !map.in_bounds(dest) {
            return Err(MoveRejection::OutOfBounds);
        }
        if map.is_obstacle(dest) {
            return Err(MoveRejection::Blocked);
        }
        let distance = self.metric.distance(player.position, dest);
        if distance > self.allowance {
            return Err(MoveRejection::TooFar {
                distance,
                allowance: self.allowance,
            });
        }
        Ok(())
    }
}
