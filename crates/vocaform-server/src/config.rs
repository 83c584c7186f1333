//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use vocaform_types::{ChoiceMatch, ConversationPolicy, NoMatchPolicy};
use vocaform_voice::SttConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Conversation policy and session lifetime.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Speech-to-text settings for audio turns.
    #[serde(default)]
    pub stt: SttSection,

    /// Completion notifications.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vocaform_conversation=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Rephrase/follow-up attempts per question before it is skipped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// `first_option`, `reject` or `follow_up`.
    #[serde(default)]
    pub no_match_policy: NoMatchPolicy,

    /// `substring` (default) or `whole_word` for choice questions.
    #[serde(default)]
    pub choice_match: ChoiceMatch,

    /// Free-text answers this short or shorter are not sentiment-scored.
    #[serde(default = "default_sentiment_min_chars")]
    pub sentiment_min_chars: usize,

    /// Idle time after which a conversation is archived as abandoned.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Whether the background reaper runs at all.
    #[serde(default = "default_reaper_enabled")]
    pub reaper_enabled: bool,
}

/// The `[stt]` section. Audio turns fail with 422 while `enabled` is false.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SttSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(flatten)]
    pub settings: SttConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Completed conversations are POSTed here. Logged only when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notify_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "vocaform.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> u32 {
    ConversationPolicy::default().max_retries
}

fn default_sentiment_min_chars() -> usize {
    ConversationPolicy::default().sentiment_min_chars
}

fn default_ttl_seconds() -> u64 {
    ConversationPolicy::default().inactivity_ttl_seconds
}

fn default_reaper_enabled() -> bool {
    true
}

fn default_notify_timeout_seconds() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            no_match_policy: NoMatchPolicy::default(),
            choice_match: ChoiceMatch::default(),
            sentiment_min_chars: default_sentiment_min_chars(),
            ttl_seconds: default_ttl_seconds(),
            reaper_enabled: default_reaper_enabled(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: default_notify_timeout_seconds(),
        }
    }
}

impl ConversationConfig {
    /// The state machine policy these settings describe.
    pub fn to_policy(&self) -> ConversationPolicy {
        ConversationPolicy {
            max_retries: self.max_retries,
            no_match: self.no_match_policy,
            choice_match: self.choice_match,
            sentiment_min_chars: self.sentiment_min_chars,
            inactivity_ttl_seconds: self.ttl_seconds,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VOCAFORM_HOST` overrides `server.host`
/// - `VOCAFORM_PORT` overrides `server.port`
/// - `VOCAFORM_DB_PATH` overrides `database.path`
/// - `VOCAFORM_LOG_LEVEL` overrides `logging.level`
/// - `VOCAFORM_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `VOCAFORM_MAX_RETRIES` overrides `conversation.max_retries`
/// - `VOCAFORM_NO_MATCH_POLICY` overrides `conversation.no_match_policy`
/// - `VOCAFORM_CHOICE_MATCH` overrides `conversation.choice_match`
/// - `VOCAFORM_CONVERSATION_TTL_SECONDS` overrides `conversation.ttl_seconds`
/// - `VOCAFORM_STT_BINARY` overrides `stt.binary_path` and enables STT
/// - `VOCAFORM_STT_MODEL` overrides `stt.model_path`
/// - `VOCAFORM_NOTIFY_WEBHOOK_URL` overrides `notifications.webhook_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if the resulting values are out of range.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = std::env::var("VOCAFORM_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("VOCAFORM_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("VOCAFORM_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("VOCAFORM_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("VOCAFORM_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(retries) = std::env::var("VOCAFORM_MAX_RETRIES") {
        if let Ok(parsed) = retries.parse() {
            config.conversation.max_retries = parsed;
        }
    }
    if let Ok(policy) = std::env::var("VOCAFORM_NO_MATCH_POLICY") {
        match policy.parse() {
            Ok(parsed) => config.conversation.no_match_policy = parsed,
            Err(e) => tracing::warn!(error = %e, "ignoring VOCAFORM_NO_MATCH_POLICY"),
        }
    }
    if let Ok(mode) = std::env::var("VOCAFORM_CHOICE_MATCH") {
        match mode.parse() {
            Ok(parsed) => config.conversation.choice_match = parsed,
            Err(e) => tracing::warn!(error = %e, "ignoring VOCAFORM_CHOICE_MATCH"),
        }
    }
    if let Ok(ttl) = std::env::var("VOCAFORM_CONVERSATION_TTL_SECONDS") {
        if let Ok(parsed) = ttl.parse() {
            config.conversation.ttl_seconds = parsed;
        }
    }
    if let Ok(binary) = std::env::var("VOCAFORM_STT_BINARY") {
        config.stt.settings.binary_path = binary.into();
        config.stt.enabled = true;
    }
    if let Ok(model) = std::env::var("VOCAFORM_STT_MODEL") {
        config.stt.settings.model_path = model.into();
    }
    if let Ok(url) = std::env::var("VOCAFORM_NOTIFY_WEBHOOK_URL") {
        config.notifications.webhook_url = Some(url).filter(|u| !u.trim().is_empty());
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.pool_max_size == 0 {
        return Err(ConfigError::Invalid(
            "database.pool_max_size must be greater than zero".to_string(),
        ));
    }
    if config.conversation.reaper_enabled && config.conversation.ttl_seconds == 0 {
        return Err(ConfigError::Invalid(
            "conversation.ttl_seconds must be greater than zero while the reaper is enabled"
                .to_string(),
        ));
    }
    if config.notifications.timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "notifications.timeout_seconds must be greater than zero".to_string(),
        ));
    }
    if config.stt.enabled {
        config
            .stt
            .settings
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }
    Ok(())
}
