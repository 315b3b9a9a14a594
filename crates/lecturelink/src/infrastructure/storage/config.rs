//! TOML-based configuration persistence.
//!
//! Reads and writes [`AppConfig`] at the platform-appropriate config file:
//! - Windows:  `%APPDATA%\LectureLink\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/lecturelink/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/LectureLink/config.toml`
//!
//! # Example file
//!
//! ```toml
//! [session]
//! display_name = "Room 4.12 lectern"
//! greeting = "Hello from client"
//! log_level = "info"
//!
//! [transport]
//! port = 8888
//! bind_address = "0.0.0.0"
//! read_timeout_ms = 5000
//!
//! # Only for groups formed outside the app, e.g. a shared classroom network.
//! [static_group]
//! role = "client"
//! owner_address = "192.168.49.1"
//! ```
//!
//! Every field has a default (`#[serde(default = "...")]`), so a missing file,
//! a missing section, or a missing key all fall back to working values.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lecturelink_core::protocol::{DEFAULT_PORT, MAX_LINE_BYTES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::session::{SessionConfig, DEFAULT_GREETING};
use crate::infrastructure::substrate::DEFAULT_FEED_DEPTH;
use crate::infrastructure::transport::TransportSettings;

/// Owner address of an ad-hoc group on the reference platform.
pub const DEFAULT_GROUP_OWNER_ADDRESS: &str = "192.168.49.1";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is not usable.
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub transport: TransportSection,
    /// Present only when the group is formed outside the app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_group: Option<StaticGroupConfig>,
}

/// Session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Sent automatically after joining a group as a client.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_true")]
    pub send_greeting: bool,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

/// Socket settings for the line exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address the owner's listener binds.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

/// This device's side of a group formed out-of-band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Owner,
    Client,
}

/// A group formed outside the app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticGroupConfig {
    pub role: GroupRole,
    #[serde(default = "default_owner_address")]
    pub owner_address: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_display_name() -> String {
    "LectureLink".to_string()
}
fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_event_queue_depth() -> usize {
    DEFAULT_FEED_DEPTH
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_max_line_bytes() -> usize {
    MAX_LINE_BYTES
}
fn default_owner_address() -> String {
    DEFAULT_GROUP_OWNER_ADDRESS.to_string()
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            greeting: default_greeting(),
            send_greeting: default_true(),
            log_level: default_log_level(),
            event_queue_depth: default_event_queue_depth(),
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

// ── Conversion to runtime settings ────────────────────────────────────────────

impl TransportSection {
    /// Validates the section and converts it to [`TransportSettings`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] for an unparsable bind address, a zero
    /// timeout, or a line limit too small to hold a terminator.
    pub fn to_settings(&self) -> Result<TransportSettings, ConfigError> {
        let bind_address = parse_ip("transport.bind_address", &self.bind_address)?;
        let connect_timeout = nonzero_ms("transport.connect_timeout_ms", self.connect_timeout_ms)?;
        let read_timeout = nonzero_ms("transport.read_timeout_ms", self.read_timeout_ms)?;
        if self.max_line_bytes < 2 {
            return Err(ConfigError::InvalidValue {
                field: "transport.max_line_bytes",
                value: self.max_line_bytes.to_string(),
            });
        }
        Ok(TransportSettings {
            port: self.port,
            bind_address,
            connect_timeout,
            read_timeout,
            max_line_bytes: self.max_line_bytes,
        })
    }
}

impl StaticGroupConfig {
    pub fn owner_ip(&self) -> Result<IpAddr, ConfigError> {
        parse_ip("static_group.owner_address", &self.owner_address)
    }
}

impl AppConfig {
    /// Builds the runtime [`SessionConfig`] described by this file.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        if self.session.event_queue_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.event_queue_depth",
                value: "0".to_string(),
            });
        }
        if self.session.greeting.contains('\n') {
            return Err(ConfigError::InvalidValue {
                field: "session.greeting",
                value: self.session.greeting.clone(),
            });
        }
        Ok(SessionConfig {
            display_name: self.session.display_name.clone(),
            greeting: self
                .session
                .send_greeting
                .then(|| self.session.greeting.clone()),
            transport: self.transport.to_settings()?,
            event_queue_depth: self.session.event_queue_depth,
        })
    }
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn nonzero_ms(field: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file, returning defaults if the
/// file does not exist yet.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to the platform config file.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, config)
}

/// Persists `config` to `path`, creating parent directories as needed.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LectureLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lecturelink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LectureLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("lecturelink_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_default_config_uses_well_known_port_and_greeting() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.transport.port, 8888);
        assert_eq!(cfg.session.greeting, "Hello from client");
        assert!(cfg.static_group.is_none());
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("empty file is valid");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_transport_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[transport]
port = 9999
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.transport.port, 9999);
        assert_eq!(cfg.transport.bind_address, "0.0.0.0");
        assert_eq!(cfg.session.log_level, "info");
    }

    #[test]
    fn test_static_group_defaults_owner_address() {
        let toml_str = r#"
[static_group]
role = "client"
"#;
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize");
        let group = cfg.static_group.expect("section present");

        assert_eq!(group.role, GroupRole::Client);
        assert_eq!(group.owner_ip().unwrap().to_string(), "192.168.49.1");
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_absent_static_group_is_not_serialized() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        assert!(!toml_str.contains("static_group"));
    }

    #[test]
    fn test_session_config_converts_timeouts_and_greeting() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.transport.read_timeout_ms = 250;
        cfg.session.send_greeting = false;

        // Act
        let session = cfg.session_config().expect("valid config");

        // Assert
        assert_eq!(session.transport.read_timeout, Duration::from_millis(250));
        assert_eq!(session.greeting, None);
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.transport.bind_address = "not-an-ip".to_string();

        let err = cfg.session_config().unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "transport.bind_address", .. }
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.transport.connect_timeout_ms = 0;
        assert!(cfg.transport.to_settings().is_err());
    }

    #[test]
    fn test_multiline_greeting_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.session.greeting = "two\nlines".to_string();
        assert!(cfg.session_config().is_err());
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let cfg = load_config_from(&temp_path()).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.transport.port = 12345;
        cfg.session.log_level = "debug".to_string();
        cfg.static_group = Some(StaticGroupConfig {
            role: GroupRole::Owner,
            owner_address: "10.0.0.1".to_string(),
        });

        // Act
        save_config_to(&path, &cfg).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
        // NoPlatformConfigDir (e.g. a stripped CI env) is also acceptable.
    }
}
