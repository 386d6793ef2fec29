//! Layered settings: built-in defaults, then `config.toml`, then CLI flags

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use logscope_stream::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MULTIPLIER, ReconnectPolicy};

const CONFIG_DIR: &str = "logscope";
const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the credential endpoint
    pub api_url: String,
    pub token_path: String,
    /// Base URL of the streaming endpoint
    pub ws_url: String,
    pub buffer_size: usize,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub reconnect: ReconnectConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
    pub multiplier: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            token_path: "/auth/jwt/".to_string(),
            ws_url: "ws://localhost:8004".to_string(),
            buffer_size: 1000,
            request_timeout_secs: 10,
            log_level: "warn".to_string(),
            log_file: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

/// Values given on the command line; `None` keeps the file or default value
#[derive(Debug, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub buffer_size: Option<usize>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// `$XDG_CONFIG_HOME/logscope/config.toml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when it exists
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Apply command-line values on top of the loaded ones
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
        if let Some(ws_url) = overrides.ws_url {
            self.ws_url = ws_url;
        }
        if let Some(buffer_size) = overrides.buffer_size {
            self.buffer_size = buffer_size;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
        if overrides.log_file.is_some() {
            self.log_file = overrides.log_file;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            bail!("buffer_size must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        if !self.reconnect.multiplier.is_finite() || self.reconnect.multiplier <= 1.0 {
            bail!(
                "reconnect.multiplier must be greater than 1.0, got {}",
                self.reconnect.multiplier
            );
        }
        if self.reconnect.base_delay_ms == 0 {
            bail!("reconnect.base_delay_ms must be greater than zero");
        }
        self.level()?;
        Ok(())
    }

    pub fn level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .with_context(|| format!("unknown log level '{}'", self.log_level))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect.base_delay_ms),
            self.reconnect.multiplier,
            self.reconnect.max_attempts,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
