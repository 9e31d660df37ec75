//! Game-state core: world grid, players, turn clock, movement and vision

pub mod clock;
pub mod map;
pub mod movement;
pub mod player;
pub mod registry;
pub mod state;
pub mod vision;

pub use clock::TurnDriver;
pub use map::GameMap;
pub use movement::DistanceMetric;
pub use player::{Player, PlayerId, PlayerStatus, PlayerSummary, Position, Role};
pub use registry::{RegistrationError, SpawnPolicy};
pub use state::{GameError, GameRules, GameState, World};
pub use vision::{SightRules, VisibleCell};
