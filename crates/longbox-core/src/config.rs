use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reconcile::{DEFAULT_MAX_RETRIES, DEFAULT_PAGE_SIZE, ReconcileConfig};

/// File name of the per-directory config, next to the snapshots.
pub const PROJECT_CONFIG_FILE: &str = "longbox.toml";

/// Environment variable holding the ComicVine API key.
pub const API_KEY_ENV: &str = "COMICVINE_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn to_reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            page_size: self.page_size,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Effective configuration after layering user and project files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongboxConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// On-disk shape of a config file. Every key is optional so a project file
/// only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub remote: RemoteOverrides,
    #[serde(default)]
    pub sync: SyncOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncOverrides {
    pub page_size: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl LongboxConfig {
    /// Overlay the keys present in `file`.
    pub fn apply(&mut self, file: ConfigFile) {
        let ConfigFile { remote, sync } = file;

        if let Some(endpoint) = remote.endpoint {
            self.remote.endpoint = endpoint;
        }
        if let Some(api_key) = remote.api_key {
            self.remote.api_key = Some(api_key);
        }
        if let Some(timeout) = remote.timeout_secs {
            self.remote.timeout_secs = timeout;
        }
        if let Some(timeout) = remote.connect_timeout_secs {
            self.remote.connect_timeout_secs = timeout;
        }
        if let Some(user_agent) = remote.user_agent {
            self.remote.user_agent = user_agent;
        }

        if let Some(page_size) = sync.page_size {
            self.sync.page_size = page_size;
        }
        if let Some(max_retries) = sync.max_retries {
            self.sync.max_retries = max_retries;
        }
        if let Some(delay) = sync.retry_delay_ms {
            self.sync.retry_delay_ms = delay;
        }
    }
}

/// Read one config file; a missing file yields `None`.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ConfigFile>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// `<config_dir>/longbox/config.toml`, when the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("longbox/config.toml"))
}

/// Defaults, then the user config, then `<snapshot_dir>/longbox.toml`.
///
/// # Errors
///
/// Fails if either config file exists but is unreadable or malformed.
pub fn resolve_config(snapshot_dir: &Path) -> Result<LongboxConfig> {
    resolve_config_from(user_config_path().as_deref(), snapshot_dir)
}

fn resolve_config_from(user_path: Option<&Path>, snapshot_dir: &Path) -> Result<LongboxConfig> {
    let mut config = LongboxConfig::default();

    if let Some(path) = user_path {
        if let Some(file) = load_config_file(path)? {
            config.apply(file);
        }
    }

    if let Some(file) = load_config_file(&snapshot_dir.join(PROJECT_CONFIG_FILE))? {
        config.apply(file);
    }

    Ok(config)
}

/// Pick the API key: CLI flag, then environment, then config.
#[must_use]
pub fn resolve_api_key(
    cli_key: Option<&str>,
    env_key: Option<&str>,
    config: &RemoteConfig,
) -> Option<String> {
    [cli_key, env_key, config.api_key.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(ToString::to_string)
}

fn default_endpoint() -> String {
    "https://comicvine.gamespot.com/api".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("longbox/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_retry_delay_ms() -> u64 {
    1_000
}
