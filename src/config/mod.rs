//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::game::map::MAX_MAP_SIDE;
use crate::game::{DistanceMetric, GameRules, Position, SightRules, SpawnPolicy};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,
    /// Global request budget for the game API
    pub requests_per_second: u32,

    /// ASCII map file; an open map of `map_width` x `map_height` otherwise
    pub map_file: Option<PathBuf>,
    pub map_width: u32,
    pub map_height: u32,

    pub rules: GameRules,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR, as on most PaaS hosts
        let server_addr = match get("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:5001".to_string()),
        };

        let turn_secs: u64 = parse_or(&get, "TURN_DURATION_SECS", 30)?;
        if turn_secs == 0 {
            return Err(ConfigError::Invalid("TURN_DURATION_SECS"));
        }

        let villager_radius: f64 = parse_or(&get, "VILLAGER_SIGHT", 4.0)?;
        if !(villager_radius.is_finite() && villager_radius > 0.0) {
            return Err(ConfigError::Invalid("VILLAGER_SIGHT"));
        }
        let werewolf_multiplier: f64 = parse_or(&get, "WEREWOLF_SIGHT_MULTIPLIER", 1.5)?;
        if !(werewolf_multiplier.is_finite() && werewolf_multiplier >= 1.0) {
            return Err(ConfigError::Invalid("WEREWOLF_SIGHT_MULTIPLIER"));
        }

        let metric = match get("MOVE_METRIC") {
            Some(raw) => raw
                .parse::<DistanceMetric>()
                .map_err(|_| ConfigError::Invalid("MOVE_METRIC"))?,
            None => DistanceMetric::default(),
        };

        let spawn = match get("SPAWN") {
            Some(raw) => parse_spawn(&raw).ok_or(ConfigError::Invalid("SPAWN"))?,
            None => SpawnPolicy::default(),
        };

        let seed: u64 = match get("WORLD_SEED") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid("WORLD_SEED"))?,
            None => rand::random(),
        };

        let map_width: u32 = parse_or(&get, "MAP_WIDTH", 10)?;
        let map_height: u32 = parse_or(&get, "MAP_HEIGHT", 10)?;
        if map_width == 0 || map_width > MAX_MAP_SIDE {
            return Err(ConfigError::Invalid("MAP_WIDTH"));
        }
        if map_height == 0 || map_height > MAX_MAP_SIDE {
            return Err(ConfigError::Invalid("MAP_HEIGHT"));
        }

        let requests_per_second: u32 = parse_or(&get, "REQUESTS_PER_SECOND", 50)?;
        if requests_per_second == 0 {
            return Err(ConfigError::Invalid("REQUESTS_PER_SECOND"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: get("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            requests_per_second,
            map_file: get("MAP_FILE").map(PathBuf::from),
            map_width,
            map_height,
            rules: GameRules {
                turn_duration: Duration::from_secs(turn_secs),
                move_allowance: parse_or(&get, "MOVE_ALLOWANCE", 3)?,
                metric,
                sight: SightRules {
                    villager_radius,
                    werewolf_multiplier,
                },
                spawn,
                seed,
            },
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        None => Ok(default),
    }
}

/// `random` or `x,y`
fn parse_spawn(raw: &str) -> Option<SpawnPolicy> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("random") {
        return Some(SpawnPolicy::Random);
    }
    let (x, y) = raw.split_once(',')?;
    Some(SpawnPolicy::Fixed(Position::new(
        x.trim().parse().ok()?,
        y.trim().parse().ok()?,
    )))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
