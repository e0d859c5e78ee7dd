//! TOML-based configuration persistence for the FaceAuth client.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\FaceAuthAccess\config.toml`
//! - Linux:    `~/.config/faceauth/config.toml`
//! - macOS:    `~/Library/Application Support/FaceAuthAccess/config.toml`
//!
//! Example file:
//!
//! ```toml
//! log_level = "info"
//!
//! [server]
//! address = "192.168.1.20"
//! port = 8101
//!
//! [timeouts]
//! connect_timeout_ms = 5000
//! write_drain_timeout_ms = 3000
//! response_timeout_secs = 30
//!
//! [protocol]
//! lenient_success = true
//! request_framing = "json-length-only"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so the client works on
//! first run (no file yet) and with files written by older versions that lack
//! newer fields.
//!
//! # Stores
//!
//! The client reaches the file through the [`ConfigStore`] trait.
//! [`TomlConfigStore`] is the real one; [`MemoryConfigStore`] keeps the
//! config in memory for tests and embedders that persist settings elsewhere.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use faceauth_core::{FrameCodec, RequestFraming, SuccessPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

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

    /// The server address is empty.
    #[error("server address must not be empty")]
    EmptyAddress,

    /// The server port is outside 1..=65535.
    #[error("server port {0} is out of range (1-65535)")]
    InvalidPort(u32),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

/// Where the FaceAuth server listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Hostname or IP address.
    #[serde(default = "default_server_address")]
    pub address: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Bounded waits used by the request session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_write_drain_timeout_ms")]
    pub write_drain_timeout_ms: u64,
    /// `0` waits for a response indefinitely.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
}

/// Wire-level behaviour switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Treat `success: false` with a "successful" message as success.
    #[serde(default = "default_true")]
    pub lenient_success: bool,
    #[serde(default)]
    pub request_framing: RequestFraming,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_server_address() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    8101
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_write_drain_timeout_ms() -> u64 {
    3000
}
fn default_response_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            timeouts: TimeoutConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            port: default_server_port(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            write_drain_timeout_ms: default_write_drain_timeout_ms(),
            response_timeout_secs: default_response_timeout_secs(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            lenient_success: default_true(),
            request_framing: RequestFraming::default(),
        }
    }
}

impl ServerConfig {
    /// Validates user-entered settings.
    ///
    /// The address is trimmed; the port must fit in 1..=65535.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyAddress`] or [`ConfigError::InvalidPort`].
    pub fn from_input(address: &str, port: u32) -> Result<Self, ConfigError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        let port = match u16::try_from(port) {
            Ok(p) if p != 0 => p,
            _ => return Err(ConfigError::InvalidPort(port)),
        };
        Ok(Self {
            address: address.to_string(),
            port,
        })
    }
}

impl TimeoutConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.write_drain_timeout_ms)
    }

    /// `None` when the response timeout is disabled.
    pub fn response_timeout(&self) -> Option<Duration> {
        match self.response_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl ProtocolConfig {
    pub fn success_policy(&self) -> SuccessPolicy {
        if self.lenient_success {
            SuccessPolicy::Lenient
        } else {
            SuccessPolicy::Strict
        }
    }

    pub fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.request_framing)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            debug!("loaded config from {}", path.display());
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no config at {}; using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`.
///
/// Creates the parent directory if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
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
    })?;
    debug!("saved config to {}", path.display());
    Ok(())
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("FaceAuthAccess"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("faceauth"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("FaceAuthAccess")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Stores ────────────────────────────────────────────────────────────────────

/// Loads and persists the client configuration.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<AppConfig, ConfigError>;
    fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;
}

/// Stores the config as a TOML file.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoPlatformConfigDir`] if no config directory is known.
    pub fn platform_default() -> Result<Self, ConfigError> {
        Ok(Self::new(config_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        load_config_from(&self.path)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        save_config_to(&self.path, config)
    }
}

/// Keeps the config in memory and counts saves.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<AppConfig>,
    saves: Mutex<usize>,
}

impl MemoryConfigStore {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Mutex::new(config),
            saves: Mutex::new(0),
        }
    }

    /// The most recently saved (or initial) config.
    pub fn current(&self) -> AppConfig {
        self.config.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        Ok(self.current())
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Ok(mut current) = self.config.lock() {
            *current = config.clone();
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
