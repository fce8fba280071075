//! Server configuration types for Huddle.
//!
//! `ServerConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};

/// Who receives live events from the subscription gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutPolicy {
    /// Every connected client sees every event.
    Broadcast,
    /// Only participants of the conversation see the event. Anonymous
    /// subscribers are refused, unlike the unfiltered `Broadcast` contract
    /// older clients expect.
    #[default]
    ParticipantsOnly,
}

/// Top-level configuration for the Huddle server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite URL. Defaults to `{data_dir}/huddle.db` when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Allowed CORS origin for browser clients. `None` allows any origin.
    #[serde(default)]
    pub client_origin: Option<String>,

    /// Per-topic buffer size of the event bus.
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    #[serde(default)]
    pub fanout_policy: FanoutPolicy,

    /// Lifetime of sessions issued by the local session store.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_event_bus_capacity() -> usize {
    1024
}

fn default_session_ttl_hours() -> u32 {
    24 * 30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: None,
            client_origin: None,
            event_bus_capacity: default_event_bus_capacity(),
            fanout_policy: FanoutPolicy::default(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}
