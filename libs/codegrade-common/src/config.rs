// Execution engine connection settings, read from the environment

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://ce.judge0.com";
pub const DEFAULT_RAPIDAPI_HOST: &str = "judge0-ce.p.rapidapi.com";

/// Whether the engine endpoint expects key-based auth headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Key,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub auth_host: String,
    pub auth_mode: AuthMode,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub submit_timeout: Duration,
    pub poll_timeout: Duration,
}

impl EngineConfig {
    /// Build a config for `api_url`, deriving the auth mode from the host
    pub fn new(api_url: &str) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        let auth_mode = if api_url.to_lowercase().contains("rapidapi.com") {
            AuthMode::Key
        } else {
            AuthMode::None
        };

        Self {
            api_url,
            api_key: None,
            auth_host: DEFAULT_RAPIDAPI_HOST.to_string(),
            auth_mode,
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 30,
            submit_timeout: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(10),
        }
    }

    /// Load from `JUDGE0_*` environment variables
    pub fn from_env() -> Self {
        let api_url = std::env::var("JUDGE0_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&api_url);

        config.api_key = std::env::var("JUDGE0_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        if let Ok(host) = std::env::var("JUDGE0_RAPIDAPI_HOST") {
            config.auth_host = host;
        }

        match std::env::var("JUDGE0_AUTH_MODE").map(|m| m.to_lowercase()).as_deref() {
            Ok("key") => config.auth_mode = AuthMode::Key,
            Ok("none") => config.auth_mode = AuthMode::None,
            _ => {}
        }

        if let Some(ms) = env_u64("JUDGE0_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(n) = env_u64("JUDGE0_MAX_POLL_ATTEMPTS") {
            config.max_poll_attempts = n as u32;
        }
        if let Some(secs) = env_u64("JUDGE0_SUBMIT_TIMEOUT_SECS") {
            config.submit_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("JUDGE0_POLL_TIMEOUT_SECS") {
            config.poll_timeout = Duration::from_secs(secs);
        }

        config
    }

    pub fn requires_key(&self) -> bool {
        self.auth_mode == AuthMode::Key
    }
}

/// Read a numeric environment variable, ignoring unparseable values
pub fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
