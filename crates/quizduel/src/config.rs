//! Server configuration, read from the environment.

use std::str::FromStr;
use std::time::Duration;

use quizduel_questions::{DEFAULT_API_BASE, DEFAULT_MODEL, OpenAiConfig, ProviderConfig};
use quizduel_room::RoomConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Everything the binary needs to start a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub room: RoomConfig,
    /// Retry and per-call timeout for question generation.
    pub provider: ProviderConfig,
    /// Connections silent for this long are closed.
    pub idle_timeout: Duration,
    /// `None` runs the server on the built-in question bank.
    pub openai: Option<OpenAiConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            room: RoomConfig::default(),
            provider: ProviderConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            openai: None,
        }
    }
}

impl ServerConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset or blank keys keep their
    /// defaults.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for the first value that does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(bind) = get("QUIZDUEL_BIND") {
            cfg.bind = bind.trim().to_string();
        }
        if let Some(secs) = parse::<u64>(&get, "QUIZDUEL_ROUND_SECS")? {
            cfg.room.round_duration = Duration::from_secs(secs);
        }
        if let Some(ms) = parse::<u64>(&get, "QUIZDUEL_LEAD_IN_MS")? {
            cfg.room.lead_in = Duration::from_millis(ms);
        }
        if let Some(rounds) = parse::<usize>(&get, "QUIZDUEL_ROUNDS")? {
            cfg.room.question_count = rounds;
        }
        if let Some(max) = parse::<usize>(&get, "QUIZDUEL_MAX_PLAYERS")? {
            cfg.room.max_players = max;
        }
        if let Some(secs) = parse::<u64>(&get, "QUIZDUEL_FINISHED_TTL_SECS")? {
            cfg.room.finished_room_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&get, "QUIZDUEL_IDLE_TIMEOUT_SECS")? {
            cfg.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse::<u64>(&get, "QUIZDUEL_GENERATOR_TIMEOUT_SECS")? {
            cfg.provider.attempt_timeout = Duration::from_secs(secs);
        }

        cfg.provider = cfg.provider.validated();
        let request_timeout = cfg.provider.attempt_timeout;
        cfg.openai = get("OPENAI_API_KEY").map(|key| OpenAiConfig {
            api_key: key.trim().to_string(),
            base_url: get("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout,
        });

        cfg.room = cfg.room.validated();
        Ok(cfg)
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError> {
    match get(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
