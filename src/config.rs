// Configuration File Support
//
// TOML configuration with environment variable overrides. Loaded from the XDG
// config directory (~/.config/instagram-manager/config.toml) unless a path is
// given on the command line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Placeholder values shipped in sample configs; never valid credentials
const PLACEHOLDER_VALUES: &[&str] = &["YOUR_META_ACCESS_TOKEN", "YOUR_IG_ID"];

/// Default handshake token when none is configured
pub const DEFAULT_VERIFY_TOKEN: &str = "meta_webhook_secret_2026";

/// Validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing or invalid configuration: {0}")]
    InvalidCredential(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty, compact")]
    InvalidLogFormat(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub credentials: Credentials,
    pub webhook: WebhookConfig,
    pub graph: GraphConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Meta app credentials
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Credentials {
    pub access_token: String,
    pub business_account_id: String,
    pub app_id: String,
    pub app_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("business_account_id", &self.business_account_id)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Check that every field is filled in with a non-placeholder value
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let fields = [
            ("access_token", &self.access_token),
            ("business_account_id", &self.business_account_id),
            ("app_id", &self.app_id),
            ("app_secret", &self.app_secret),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() || PLACEHOLDER_VALUES.contains(&value.as_str()) {
                return Err(ConfigError::InvalidCredential(name));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
            && self.business_account_id.is_empty()
            && self.app_id.is_empty()
            && self.app_secret.is_empty()
    }
}

/// Webhook receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    /// Port the receiver listens on
    pub port: u16,

    /// Token expected in hub.verify_token during the handshake
    pub verify_token: String,

    /// Shared secret for payload signatures; unsigned mode when absent
    pub secret: Option<String>,

    /// Reject deliveries without a signature header when a secret is set
    pub require_signature: bool,

    /// Upper bound on a single handler invocation
    pub handler_timeout_secs: Option<u64>,

    /// Reply sent to every inbound direct message
    pub auto_reply_message: Option<String>,

    pub auto_reply_comments: bool,

    pub comment_reply_message: Option<String>,

    /// Append each comment as a JSON line to `comments_log_path`
    pub log_comments: bool,

    pub comments_log_path: PathBuf,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            verify_token: DEFAULT_VERIFY_TOKEN.to_string(),
            secret: None,
            require_signature: false,
            handler_timeout_secs: None,
            auto_reply_message: None,
            auto_reply_comments: false,
            comment_reply_message: None,
            log_comments: false,
            comments_log_path: PathBuf::from("comments.log"),
        }
    }
}

/// Graph API client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v18.0".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve /metrics from the webhook server
    pub enabled: bool,
}

/// What the webhook endpoint needs at runtime, fixed for the server's lifetime
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    pub verify_token: String,
    pub secret: Option<String>,
    pub require_signature: bool,
    pub handler_timeout: Option<Duration>,
    pub metrics_enabled: bool,
}

impl std::fmt::Debug for WebhookSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSettings")
            .field("verify_token", &"<redacted>")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("require_signature", &self.require_signature)
            .field("handler_timeout", &self.handler_timeout)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            verify_token: DEFAULT_VERIFY_TOKEN.to_string(),
            secret: None,
            require_signature: false,
            handler_timeout: None,
            metrics_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the result fails validation. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path, then apply environment
    /// overrides and validate.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load_from_path`] with an explicit environment lookup
    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file to {:?}", path))?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/instagram-manager/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "instagram-manager", "instagram-manager") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("instagram-manager")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides; they take precedence over the file.
    ///
    /// Unparseable numeric or boolean values keep the file value.
    fn apply_overrides<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Credentials
        if let Some(token) = env("INSTAGRAM_ACCESS_TOKEN") {
            self.credentials.access_token = token;
        }
        if let Some(id) = env("INSTAGRAM_BUSINESS_ACCOUNT_ID") {
            self.credentials.business_account_id = id;
        }
        if let Some(id) = env("INSTAGRAM_APP_ID") {
            self.credentials.app_id = id;
        }
        if let Some(secret) = env("INSTAGRAM_APP_SECRET") {
            self.credentials.app_secret = secret;
        }

        // Webhook
        if let Some(port) = env("WEBHOOK_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.webhook.port = port;
            }
        }
        if let Some(token) = env("WEBHOOK_VERIFY_TOKEN") {
            self.webhook.verify_token = token;
        }
        if let Some(secret) = env("WEBHOOK_SECRET").filter(|s| !s.is_empty()) {
            self.webhook.secret = Some(secret);
        }
        if let Some(message) = env("AUTO_REPLY_MESSAGE").filter(|s| !s.is_empty()) {
            self.webhook.auto_reply_message = Some(message);
        }
        if let Some(enabled) = env("AUTO_REPLY_COMMENTS") {
            self.webhook.auto_reply_comments = enabled.parse().unwrap_or(self.webhook.auto_reply_comments);
        }
        if let Some(enabled) = env("LOG_COMMENTS") {
            self.webhook.log_comments = enabled.parse().unwrap_or(self.webhook.log_comments);
        }

        // Logging
        if let Some(level) = env("IGM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env("IGM_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Metrics
        if let Some(enabled) = env("IGM_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self
    }

    /// Validate everything except credentials
    ///
    /// Credentials are checked separately by [`Credentials::validate`] since
    /// `auth setup` must be able to run without them.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(ConfigError::InvalidLogLevel(self.logging.level.clone())),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => return Err(ConfigError::InvalidLogFormat(self.logging.format.clone())),
        }

        if self.webhook.verify_token.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "webhook.verify_token",
                reason: "must not be empty".to_string(),
            });
        }
        if self.webhook.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "webhook.port",
                reason: "must be > 0".to_string(),
            });
        }
        if self.webhook.handler_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "webhook.handler_timeout_secs",
                reason: "must be > 0 when set".to_string(),
            });
        }
        if self.graph.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graph.timeout_secs",
                reason: "must be > 0".to_string(),
            });
        }

        Ok(())
    }

    /// Runtime settings for the webhook endpoint
    pub fn webhook_settings(&self) -> WebhookSettings {
        WebhookSettings {
            verify_token: self.webhook.verify_token.clone(),
            secret: self.webhook.secret.clone(),
            require_signature: self.webhook.require_signature,
            handler_timeout: self.webhook.handler_timeout_secs.map(Duration::from_secs),
            metrics_enabled: self.metrics.enabled,
        }
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
