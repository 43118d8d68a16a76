//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::cli::ConfigAction;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    pub log: LogConfig,

    /// Session channel configuration
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Server URL (ws:// or wss://)
    pub url: String,

    /// Heartbeat cadence in milliseconds
    pub heartbeat_interval_ms: u64,

    /// Backoff base wait in milliseconds
    pub reconnect_base_ms: u64,

    /// Backoff wait ceiling in milliseconds
    pub reconnect_cap_ms: u64,

    /// Maximum automatic reconnection attempts
    pub max_reconnect_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Absolute or relative path to the log file
    pub file_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log: LogConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            heartbeat_interval_ms: 30_000,
            reconnect_base_ms: 1_000,
            reconnect_cap_ms: 30_000,
            max_reconnect_attempts: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: "logs/sessionlink.log".to_string(),
        }
    }
}

impl ChannelConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        // SESSIONLINK_LOG_LEVEL - logging level
        if let Ok(log_level) = env::var("SESSIONLINK_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // SESSIONLINK_LOG_FILE_PATH - logging destination file
        if let Ok(file_path) = env::var("SESSIONLINK_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = file_path;
            }
        }

        // SESSIONLINK_URL - server URL
        if let Ok(url) = env::var("SESSIONLINK_URL") {
            self.channel.url = url;
        }

        // SESSIONLINK_HEARTBEAT_INTERVAL_MS - heartbeat cadence
        if let Ok(interval) = env::var("SESSIONLINK_HEARTBEAT_INTERVAL_MS") {
            if let Ok(value) = interval.parse::<u64>() {
                self.channel.heartbeat_interval_ms = value;
            }
        }

        // SESSIONLINK_RECONNECT_BASE_MS - backoff base wait
        if let Ok(base) = env::var("SESSIONLINK_RECONNECT_BASE_MS") {
            if let Ok(value) = base.parse::<u64>() {
                self.channel.reconnect_base_ms = value;
            }
        }

        // SESSIONLINK_RECONNECT_CAP_MS - backoff wait ceiling
        if let Ok(cap) = env::var("SESSIONLINK_RECONNECT_CAP_MS") {
            if let Ok(value) = cap.parse::<u64>() {
                self.channel.reconnect_cap_ms = value;
            }
        }

        // SESSIONLINK_MAX_RECONNECT_ATTEMPTS - reconnection budget
        if let Ok(attempts) = env::var("SESSIONLINK_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(value) = attempts.parse::<u32>() {
                self.channel.max_reconnect_attempts = value;
            }
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|err| {
            tracing::warn!("Failed to load config: {}, using defaults", err);
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.channel.url.starts_with("ws://") && !self.channel.url.starts_with("wss://") {
            anyhow::bail!("Server URL must use the ws:// or wss:// scheme");
        }

        if self.channel.heartbeat_interval_ms == 0 {
            anyhow::bail!("Heartbeat interval must be greater than 0");
        }

        if self.channel.reconnect_base_ms == 0 {
            anyhow::bail!("Reconnect base wait must be greater than 0");
        }

        if self.channel.reconnect_cap_ms < self.channel.reconnect_base_ms {
            anyhow::bail!("Reconnect wait ceiling must not be below the base wait");
        }

        if self.channel.max_reconnect_attempts == 0 {
            anyhow::bail!("Max reconnect attempts must be greater than 0");
        }

        if self.log.file_path.trim().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        Ok(())
    }

    /// Handle configuration command
    pub fn handle_command(action: &Option<ConfigAction>, config_file: &str) -> Result<()> {
        match action {
            Some(ConfigAction::Show) => {
                let config = Config::load_or_default(config_file);
                println!("Configuration from {}", config_file);
                println!("{:#?}", config);
            }
            Some(ConfigAction::Reset) => {
                let default_config = Config::default();
                default_config.save_to_file(config_file)?;
                println!("Configuration reset to defaults in {}", config_file);
            }
            None => {
                println!("Configuration management commands:");
                println!("  sessionlink config show  - Show current configuration");
                println!("  sessionlink config reset - Reset to default configuration");
            }
        }
        Ok(())
    }
}
