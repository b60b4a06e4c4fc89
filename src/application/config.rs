use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::domain::value_objects::thresholds::ThresholdSet;

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Control socket location and per-connection timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    #[serde(default = "default_socket_path")]
    pub path: String,
    #[serde(default = "default_socket_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests_per_sec: usize,
}

/// Health check cadence and collector switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_apt_check_every")]
    pub apt_check_every: u32,
    #[serde(default = "default_disk_path")]
    pub disk_path: String,
    #[serde(default = "default_true")]
    pub enable_apt: bool,
    #[serde(default = "default_true")]
    pub enable_services: bool,
    /// Upper bound for each `apt` or `systemctl` run.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Old alerts are purged on every Nth check, starting with the first.
    #[serde(default = "default_cleanup_every")]
    pub cleanup_every: u32,
}

/// Alert thresholds, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_disk_warn")]
    pub disk_warn_percent: f64,
    #[serde(default = "default_disk_crit")]
    pub disk_crit_percent: f64,
    #[serde(default = "default_mem_warn")]
    pub memory_warn_percent: f64,
    #[serde(default = "default_mem_crit")]
    pub memory_crit_percent: f64,
}

/// Language model used to enrich alerts (none, local, claude, openai, claude-cli).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Executable used by the `claude-cli` provider.
    #[serde(default = "default_claude_binary")]
    pub claude_binary: String,
}

/// Database storage path (tilde-expanded at point of use) and alert retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Alerts older than this many days are deleted; 0 keeps everything.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

// --- Defaults ---

fn default_log_level() -> String {
    "info".into()
}

fn default_socket_path() -> String {
    "/run/hostwatch/hostwatch.sock".into()
}

const fn default_socket_timeout() -> u64 {
    5000
}

const fn default_max_requests() -> usize {
    100
}

const fn default_interval() -> u64 {
    300
}

const fn default_poll_interval() -> u64 {
    1000
}

const fn default_apt_check_every() -> u32 {
    5
}

fn default_disk_path() -> String {
    "/".into()
}

const fn default_true() -> bool {
    true
}

const fn default_command_timeout() -> u64 {
    60
}

const fn default_cleanup_every() -> u32 {
    12
}

const fn default_disk_warn() -> f64 {
    80.0
}

const fn default_disk_crit() -> f64 {
    95.0
}

const fn default_mem_warn() -> f64 {
    85.0
}

const fn default_mem_crit() -> f64 {
    95.0
}

fn default_provider() -> String {
    "none".into()
}

const fn default_max_tokens() -> u32 {
    150
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_llm_timeout() -> u64 {
    30
}

fn default_claude_binary() -> String {
    "claude".into()
}

fn default_database_path() -> String {
    "~/.local/share/hostwatch/alerts.db".into()
}

const fn default_retention_days() -> u32 {
    30
}

// --- Default impls ---

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: default_socket_path(),
            timeout_ms: default_socket_timeout(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_sec: default_max_requests(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            poll_interval_ms: default_poll_interval(),
            apt_check_every: default_apt_check_every(),
            disk_path: default_disk_path(),
            enable_apt: default_true(),
            enable_services: default_true(),
            command_timeout_secs: default_command_timeout(),
            cleanup_every: default_cleanup_every(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            disk_warn_percent: default_disk_warn(),
            disk_crit_percent: default_disk_crit(),
            memory_warn_percent: default_mem_warn(),
            memory_crit_percent: default_mem_crit(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            base_url: None,
            api_key_env: None,
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            claude_binary: default_claude_binary(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            retention_days: default_retention_days(),
        }
    }
}

// --- AppConfig methods ---

impl AppConfig {
    /// Load from a specific path, or create a default config file if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is invalid,
    /// or the default config file cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Load from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML content is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to a specific path, creating parent directories if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Default location: `$XDG_CONFIG_HOME/hostwatch/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("hostwatch").join("config.toml"))
    }

    #[must_use]
    pub fn thresholds(&self) -> ThresholdSet {
        ThresholdSet::from(&self.thresholds)
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.interval_secs.max(1))
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring.poll_interval_ms.max(10))
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.monitoring.command_timeout_secs.max(1))
    }

    #[must_use]
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket.timeout_ms.max(1))
    }

    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.socket.path).as_ref())
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).as_ref())
    }
}

impl From<&ThresholdConfig> for ThresholdSet {
    fn from(config: &ThresholdConfig) -> Self {
        let disk_warning = config.disk_warn_percent.clamp(0.0, 100.0);
        let memory_warning = config.memory_warn_percent.clamp(0.0, 100.0);

        // Critical never sits below warning
        Self {
            disk_warning,
            disk_critical: config.disk_crit_percent.clamp(0.0, 100.0).max(disk_warning),
            memory_warning,
            memory_critical: config
                .memory_crit_percent
                .clamp(0.0, 100.0)
                .max(memory_warning),
        }
    }
}

/// Owns the config file path and the currently effective configuration.
///
/// Built once at startup and shared by `Arc`; readers get copies.
pub struct ConfigManager {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigManager {
    #[must_use]
    pub fn new(path: PathBuf, config: AppConfig) -> Self {
        Self {
            path,
            current: RwLock::new(config),
        }
    }

    /// Load the file at `path`, writing defaults first if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, read or parsed.
    pub fn open(path: PathBuf) -> Result<Self> {
        let config = AppConfig::load_or_create(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        Ok(Self::new(path, config))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn get(&self) -> AppConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the file and swap it in. The previous config stays in effect on error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn reload(&self) -> Result<AppConfig> {
        let config = AppConfig::load_from(&self.path)
            .with_context(|| format!("Failed to reload config from {}", self.path.display()))?;
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config.clone();
        Ok(config)
    }
}
