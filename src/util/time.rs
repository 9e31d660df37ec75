//! Time utilities for uptime reporting

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Seconds as a float with millisecond precision, for JSON responses
pub fn secs_f64_millis(duration: Duration) -> f64 {
    duration.as_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_milliseconds() {
        assert_eq!(secs_f64_millis(Duration::from_micros(1_234_567)), 1.234);
        assert_eq!(secs_f64_millis(Duration::ZERO), 0.0);
    }

    #[test]
    fn uptime_after_init() {
        init_server_time();
        assert!(uptime_secs() < 60);
    }
}
