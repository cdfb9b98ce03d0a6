use serde::Deserialize;

/// Outbox engine configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct OutboxConfig {
    /// Events claimed per store round-trip. Default: 10.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Upper bound on events handled by one invocation. Default: 50.
    #[serde(default = "default_max_events_per_run")]
    pub max_events_per_run: u64,
    /// Attempt ceiling written to newly enqueued events. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Time budget for a single event's dispatch. Default: 15.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    /// A `processing` row older than this is reported as stuck. Default: 600.
    #[serde(default = "default_stuck_after_secs")]
    pub stuck_after_secs: u64,
}

fn default_batch_size() -> u64 {
    10
}
fn default_max_events_per_run() -> u64 {
    50
}
fn default_max_attempts() -> i32 {
    3
}
fn default_handler_timeout_secs() -> u64 {
    15
}
fn default_stuck_after_secs() -> u64 {
    600
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_events_per_run: default_max_events_per_run(),
            max_attempts: default_max_attempts(),
            handler_timeout_secs: default_handler_timeout_secs(),
            stuck_after_secs: default_stuck_after_secs(),
        }
    }
}
