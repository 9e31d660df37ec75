//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::GameState;
use crate::util::rate_limit::{create_limiter, Limiter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: Arc<GameState>,
    pub limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config, game: GameState) -> Self {
        let limiter = create_limiter(config.requests_per_second);
        Self {
            config: Arc::new(config),
            game: Arc::new(game),
            limiter,
        }
    }
}
