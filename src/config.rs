use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Process-wide configuration, read once at startup and passed around
/// explicitly.
#[derive(Clone, Debug)]
pub struct Config {
    /// How often the scheduler checks for races due to start.
    pub race_start_poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Config {
        dotenv().ok();

        let poll_secs = env::var("RACE_START_POLL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Config {
            race_start_poll_interval: Duration::from_secs(poll_secs),
        }
    }
}
