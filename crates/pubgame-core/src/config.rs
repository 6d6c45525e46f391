//! Client configuration management.
//!
//! Holds the two external addresses (HTTP API base and realtime base), the
//! login entry point and which backend keeps the session token.
//!
//! Configuration is stored at `~/.config/pubgame/config.json`; the
//! `PUBGAME_API_BASE`, `PUBGAME_WS_BASE` and `PUBGAME_TOKEN_BACKEND`
//! environment variables override it.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::DEFAULT_LOGIN_PATH;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "pubgame";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE: &str = "http://localhost:4000";

pub const ENV_API_BASE: &str = "PUBGAME_API_BASE";
pub const ENV_WS_BASE: &str = "PUBGAME_WS_BASE";
pub const ENV_TOKEN_BACKEND: &str = "PUBGAME_TOKEN_BACKEND";

/// Where the session token is kept between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for TokenBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" | "keychain" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown token backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub ws_base: Option<String>,
    pub login_path: String,
    pub token_backend: TokenBackend,
    pub last_email: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            token_backend: TokenBackend::default(),
            last_email: None,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `PUBGAME_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_base) = lookup(ENV_API_BASE) {
            self.api_base = api_base;
        }
        if let Some(ws_base) = lookup(ENV_WS_BASE) {
            self.ws_base = Some(ws_base);
        }
        if let Some(backend) = lookup(ENV_TOKEN_BACKEND) {
            self.token_backend = backend
                .parse::<TokenBackend>()
                .with_context(|| format!("Invalid {}", ENV_TOKEN_BACKEND))?;
        }
        Ok(())
    }

    /// Realtime base: configured explicitly, or derived from the API base by
    /// scheme substitution.
    pub fn ws_base(&self) -> String {
        match self.ws_base {
            Some(ref ws_base) => ws_base.clone(),
            None => derive_ws_base(&self.api_base),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

fn derive_ws_base(api_base: &str) -> String {
    if let Some(rest) = api_base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_base.to_string()
    }
}
