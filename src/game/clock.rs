//! Turn clock and the background task that advances it

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

use super::state::GameState;

/// Current turn and how long it has left.
///
/// Only the facade's write lock hands out `&mut WorldClock`, so at most one
/// `advance` runs at a time.
#[derive(Debug, Clone)]
pub struct WorldClock {
    turn: u64,
    turn_started: Instant,
    turn_started_at: DateTime<Utc>,
    turn_duration: Duration,
}

impl WorldClock {
    pub fn new(turn_duration: Duration) -> Self {
        Self {
            turn: 0,
            turn_started: Instant::now(),
            turn_started_at: Utc::now(),
            turn_duration,
        }
    }

    pub fn current_turn(&self) -> u64 {
        self.turn
    }

    pub fn turn_duration(&self) -> Duration {
        self.turn_duration
    }

    /// Wall-clock start of the current turn
    pub fn turn_started_at(&self) -> DateTime<Utc> {
        self.turn_started_at
    }

    pub fn time_remaining(&self) -> Duration {
        self.time_remaining_at(Instant::now())
    }

    /// `turn_duration - elapsed`, floored at zero
    pub fn time_remaining_at(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.turn_started);
        self.turn_duration.saturating_sub(elapsed)
    }

    /// Start the next turn
    pub fn advance(&mut self) -> u64 {
        self.turn += 1;
        self.turn_started = Instant::now();
        self.turn_started_at = Utc::now();
        self.turn
    }
}

/// Periodic driver for `GameState::advance_turn`
pub struct TurnDriver {
    game: Arc<GameState>,
}

impl TurnDriver {
    pub fn new(game: Arc<GameState>) -> Self {
        Self { game }
    }

    /// Advance the world clock once per turn duration, forever
    pub async fn run(self) {
        let turn_duration = self.game.turn_duration();
        info!(turn_secs = turn_duration.as_secs_f64(), "Turn driver started");

        let mut ticker = interval(turn_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately; turn 0 is already running
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let turn = self.game.advance_turn();
            info!(turn, "New turn");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::GameMap;
    use crate::game::state::{GameRules, World};

    #[test]
    fn starts_at_turn_zero_and_counts_up() {
        let mut clock = WorldClock::new(Duration::from_secs(30));
        assert_eq!(clock.current_turn(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.current_turn(), 2);
    }

    #[test]
    fn time_remaining_is_floored_at_zero() {
        let clock = WorldClock::new(Duration::from_secs(30));
        let start = clock.turn_started;
        assert_eq!(clock.time_remaining_at(start), Duration::from_secs(30));
        assert_eq!(
            clock.time_remaining_at(start + Duration::from_secs(12)),
            Duration::from_secs(18)
        );
        assert_eq!(
            clock.time_remaining_at(start + Duration::from_secs(90)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn advance_resets_the_turn_timer() {
        let mut clock = WorldClock::new(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(clock.time_remaining(), Duration::from_secs(6));
        clock.advance();
        assert_eq!(clock.time_remaining(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn driver_advances_once_per_period() {
        let rules = GameRules {
            turn_duration: Duration::from_secs(5),
            ..GameRules::default()
        };
        let world = World::new(GameMap::open(4, 4).unwrap(), rules).unwrap();
        let game = Arc::new(GameState::new(world));

        let handle = tokio::spawn(TurnDriver::new(game.clone()).run());
        tokio::task::yield_now().await;
        assert_eq!(game.current_turn(), 0);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(game.current_turn(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(game.current_turn(), 3);

        handle.abort();
    }
}
