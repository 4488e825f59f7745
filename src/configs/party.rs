use serde::{Deserialize, Serialize};

/// Coordinator tuning. Every threshold the party engine uses lives here.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PartyConfig {
    /// How long a dropped participant keeps their seat (and host role).
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Silence after which a connected participant is considered dropped.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// How far behind the authoritative state a playback command may be and still apply.
    #[serde(default = "default_staleness_tolerance_ms")]
    pub staleness_tolerance_ms: u64,
    /// Buffering fraction that triggers a pause when guest control is enabled.
    #[serde(default = "default_guest_buffering_threshold")]
    pub guest_buffering_threshold: f64,
    /// Resume automatically once everyone is ready after a buffering pause.
    #[serde(default)]
    pub auto_resume: bool,
    #[serde(default = "default_chat_retention")]
    pub chat_retention: usize,
    /// Recent chat entries replayed to a joining participant.
    #[serde(default = "default_history_replay")]
    pub history_replay: usize,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Upper bound for `maxParticipants` in any party.
    #[serde(default = "default_max_party_size")]
    pub max_party_size: usize,
    /// Attempts at drawing an unused party code before giving up.
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            staleness_tolerance_ms: default_staleness_tolerance_ms(),
            guest_buffering_threshold: default_guest_buffering_threshold(),
            auto_resume: false,
            chat_retention: default_chat_retention(),
            history_replay: default_history_replay(),
            sweep_interval_ms: default_sweep_interval_ms(),
            max_party_size: default_max_party_size(),
            code_attempts: default_code_attempts(),
        }
    }
}

fn default_grace_period_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    15_000
}

fn default_staleness_tolerance_ms() -> u64 {
    2_000
}

fn default_guest_buffering_threshold() -> f64 {
    0.30
}

fn default_chat_retention() -> usize {
    200
}

fn default_history_replay() -> usize {
    50
}

fn default_sweep_interval_ms() -> u64 {
    1_000
}

fn default_max_party_size() -> usize {
    16
}

fn default_code_attempts() -> u32 {
    32
}
