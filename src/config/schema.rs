use crate::error::ConfigError;
use crate::gate::RuntimeSurface;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub surface: SurfaceConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub log: LogConfig,
}

// ── Surface ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// "popup" hosts the request bridge; "page" never does.
    #[serde(default = "default_surface_kind")]
    pub kind: String,
}

fn default_surface_kind() -> String {
    "popup".into()
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            kind: default_surface_kind(),
        }
    }
}

impl SurfaceConfig {
    pub fn runtime_surface(&self) -> std::result::Result<RuntimeSurface, ConfigError> {
        RuntimeSurface::from_str(self.kind.trim()).map_err(|_| {
            ConfigError::Validation(format!(
                "surface.kind must be \"popup\" or \"page\", got {:?}",
                self.kind
            ))
        })
    }
}

// ── Approval timing ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Fail a request nobody decided on within this many seconds (0 = never)
    #[serde(default = "default_review_timeout_secs")]
    pub review_timeout_secs: u64,
    /// Give up on the page side after this many seconds (0 = wait)
    #[serde(default)]
    pub call_timeout_secs: u64,
}

fn default_review_timeout_secs() -> u64 {
    300
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            review_timeout_secs: default_review_timeout_secs(),
            call_timeout_secs: 0,
        }
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

impl ApprovalConfig {
    #[must_use]
    pub fn review_timeout(&self) -> Option<Duration> {
        secs(self.review_timeout_secs)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        secs(self.call_timeout_secs)
    }
}

// ── Snapshot store ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" (default) or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// `SQLite` file; `~` is expanded
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

fn default_store_path() -> String {
    "~/.walletgate/state.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }
}

// ── Gateway ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 7420)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
}

fn default_gateway_port() -> u16 {
    7420
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
        }
    }
}

// ── Wallet ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Hex signing key for the local development wallet; generated per run
    /// when absent
    #[serde(default)]
    pub key_hex: Option<String>,
}

// ── Logging ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".walletgate").join("config.toml"),
            surface: SurfaceConfig::default(),
            approval: ApprovalConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            wallet: WalletConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let walletgate_dir = home.join(".walletgate");

        if !walletgate_dir.exists() {
            fs::create_dir_all(&walletgate_dir)
                .context("Failed to create .walletgate directory")?;
        }

        Self::load_or_init_at(&walletgate_dir.join("config.toml"))
    }

    /// Read `config_path`, or write defaults there when it does not exist.
    pub fn load_or_init_at(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load_from_path(config_path)
        } else {
            let config = Self {
                config_path: config_path.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Parse `config_path`. Callers validate once env overrides are applied.
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(config_path)
            .map_err(ConfigError::Io)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", config_path.display())))?;
        config.config_path = config_path.to_path_buf();
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // Surface: WALLETGATE_SURFACE
        if let Ok(surface) = std::env::var("WALLETGATE_SURFACE") {
            if !surface.is_empty() {
                self.surface.kind = surface;
            }
        }

        // Gateway port: WALLETGATE_GATEWAY_PORT
        if let Ok(port_str) = std::env::var("WALLETGATE_GATEWAY_PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        // Gateway host: WALLETGATE_GATEWAY_HOST
        if let Ok(host) = std::env::var("WALLETGATE_GATEWAY_HOST") {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }

        // Log level: WALLETGATE_LOG
        if let Ok(level) = std::env::var("WALLETGATE_LOG") {
            if !level.is_empty() {
                self.log.level = level;
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.surface.runtime_surface()?;
        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::Validation(format!(
                "store.backend must be \"sqlite\" or \"memory\", got {:?}",
                self.store.backend
            )));
        }
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "gateway.port must be non-zero".to_string(),
            ));
        }
        if tracing::Level::from_str(&self.log.level).is_err() {
            return Err(ConfigError::Validation(format!(
                "log.level {:?} is not a tracing level",
                self.log.level
            )));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str)
            .map_err(ConfigError::Io)
            .context("Failed to write config file")?;
        Ok(())
    }
}
