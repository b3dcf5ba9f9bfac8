use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_CONFIG_FILE: &str = "courier.toml";
pub const MAX_BODY_BYTES: usize = 1024 * 1024; // 1 MB request body cap
pub const READY_TIMEOUT_SECS: u64 = 30; // abort startup if the gateway never readies
pub const READY_POLL_MS: u64 = 100; // readiness poll cadence during startup

/// Environment variable that always feeds `discord.bot_token`.
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

/// Top-level config (courier.toml + COURIER_* env overrides + DISCORD_TOKEN).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Upper bound on request bodies; larger bodies are rejected as invalid.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Cap on concurrently processed requests. 0 means unbounded.
    #[serde(default)]
    pub max_in_flight: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            max_body_bytes: MAX_BODY_BYTES,
            max_in_flight: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. Usually supplied through `DISCORD_TOKEN`.
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            ready_timeout_secs: READY_TIMEOUT_SECS,
            ready_poll_ms: READY_POLL_MS,
        }
    }
}

impl DiscordConfig {
    /// The configured token, if present and not blank.
    pub fn token(&self) -> Option<&str> {
        self.bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Request handling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Match JSON keys case-insensitively (`USERID` == `userId`).
    #[serde(default = "bool_true")]
    pub case_insensitive_keys: bool,
    /// Reject requests carrying neither `message` nor `embed` with 400.
    /// When false they are acknowledged with 200 and nothing is sent.
    #[serde(default = "bool_true")]
    pub reject_empty: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            case_insensitive_keys: true,
            reject_empty: true,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_max_body_bytes() -> usize {
    MAX_BODY_BYTES
}
fn default_ready_timeout_secs() -> u64 {
    READY_TIMEOUT_SECS
}
fn default_ready_poll_ms() -> u64 {
    READY_POLL_MS
}

impl CourierConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Layers, later wins:
    ///   1. Built-in defaults
    ///   2. Explicit path argument, else ./courier.toml (a missing file is fine)
    ///   3. COURIER_<SECTION>__<KEY>, e.g. COURIER_GATEWAY__PORT=8080
    ///   4. DISCORD_TOKEN → discord.bot_token
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        tracing::debug!(path, "loading config");

        let config: CourierConfig = Figment::from(Serialized::defaults(CourierConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("COURIER_").split("__"))
            .merge(
                Env::raw().filter_map(|key| {
                    key.as_str()
                        .eq_ignore_ascii_case(TOKEN_ENV)
                        .then(|| "discord.bot_token".into())
                }),
            )
            .extract()
            .map_err(|e| crate::error::CourierError::Config(e.to_string()))?;

        Ok(config)
    }
}
