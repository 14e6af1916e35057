//! # Configuration Management Module
//!
//! TOML configuration for a single codec connection.
//!
//! ## Configuration Structure
//!
//! - [`CodecConfig`] - transport selection, address, credentials, self-view policy
//! - [`DirectoryConfig`] - phonebook type, result limit, auto-populate behaviour
//! - [`TimingConfig`] - handshake timeout, reconnect delay and periodic refresh intervals
//! - [`LayoutConfig`] - firmware threshold for the enhanced layout family
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use codecsync::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Codec: {}:{}", config.codec.host, config.codec.port);
//!     Config::create_default("config.example.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [codec]
//! transport = "tcp"
//! host = "10.0.0.20"
//! port = 23
//! username = "admin"
//! password = "secret"
//!
//! [directory]
//! phonebook_mode = "Corporate"
//! result_limit = 255
//! ```
//!
//! Every section and field has a default, so a partial file is accepted.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::codec::status::FirmwareVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Tcp,
    Serial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub serial_port: String,
    pub baud_rate: u32,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Keep self-view on while in a call. Outside calls it is always turned off.
    pub show_self_view_by_default: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            host: "127.0.0.1".to_string(),
            port: 23,
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            username: "admin".to_string(),
            password: String::new(),
            show_self_view_by_default: false,
        }
    }
}

/// Which codec phonebook to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PhonebookMode {
    #[default]
    Corporate,
    Local,
}

impl PhonebookMode {
    pub fn as_wire(&self) -> &'static str {
        match self {
            PhonebookMode::Corporate => "Corporate",
            PhonebookMode::Local => "Local",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub phonebook_mode: PhonebookMode,
    /// `Limit:` argument for contact searches and the contact-count query.
    pub result_limit: u32,
    /// When false an identical repeated search is not re-issued.
    pub auto_populate: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            phonebook_mode: PhonebookMode::Corporate,
            result_limit: 255,
            auto_populate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub handshake_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub feedback_check_interval_secs: u64,
    pub phonebook_refresh_secs: u64,
    pub booking_refresh_secs: u64,
    pub meeting_warning_minutes: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 60,
            reconnect_delay_secs: 5,
            request_timeout_secs: 60,
            feedback_check_interval_secs: 300,
            phonebook_refresh_secs: 3600,
            booking_refresh_secs: 900,
            meeting_warning_minutes: 5,
        }
    }
}

impl TimingConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs.max(1))
    }
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
    pub fn feedback_check_interval(&self) -> Duration {
        Duration::from_secs(self.feedback_check_interval_secs.max(10))
    }
    pub fn phonebook_refresh(&self) -> Duration {
        Duration::from_secs(self.phonebook_refresh_secs.max(60))
    }
    pub fn booking_refresh(&self) -> Duration {
        Duration::from_secs(self.booking_refresh_secs.max(60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// First firmware version that reports `Video Layout CurrentLayouts`.
    pub enhanced_layouts_min_version: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            enhanced_layouts_min_version: "9.15.10.8".to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn threshold(&self) -> Result<FirmwareVersion> {
        FirmwareVersion::parse(&self.enhanced_layouts_min_version).ok_or_else(|| {
            anyhow!(
                "invalid enhanced_layouts_min_version '{}'",
                self.enhanced_layouts_min_version
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("codecsync.log".to_string()),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub codec: CodecConfig,
    pub directory: DirectoryConfig,
    pub timing: TimingConfig,
    pub layouts: LayoutConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        Config::default().save(path).await
    }

    /// Persist this configuration (overwrites the file).
    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.layouts.threshold()?;
        if self.codec.transport == TransportKind::Tcp && self.codec.host.trim().is_empty() {
            return Err(anyhow!("codec.host must be set for tcp transport"));
        }
        if self.codec.transport == TransportKind::Serial && self.codec.serial_port.is_empty() {
            return Err(anyhow!("codec.serial_port must be set for serial transport"));
        }
        if self.directory.result_limit == 0 {
            return Err(anyhow!("directory.result_limit must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.codec.transport, TransportKind::Tcp);
        assert_eq!(config.timing.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.directory.phonebook_mode.as_wire(), "Corporate");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [codec]
            host = "10.1.2.3"
            transport = "serial"

            [directory]
            phonebook_mode = "Local"
            "#,
        )
        .unwrap();
        assert_eq!(config.codec.host, "10.1.2.3");
        assert_eq!(config.codec.transport, TransportKind::Serial);
        assert_eq!(config.codec.baud_rate, 115200);
        assert_eq!(config.directory.phonebook_mode, PhonebookMode::Local);
        assert_eq!(config.directory.result_limit, 255);
        assert_eq!(config.timing.phonebook_refresh_secs, 3600);
    }

    #[test]
    fn bad_layout_threshold_is_rejected() {
        let mut config = Config::default();
        config.layouts.enhanced_layouts_min_version = "banana".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_result_limit_is_rejected() {
        let mut config = Config::default();
        config.directory.result_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_password_is_not_serialized() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(!text.contains("password"));
    }
}
