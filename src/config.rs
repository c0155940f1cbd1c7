//! Client configuration: config dir, discovery port, fallback URL, sweep tuning.
//! Read from `config.json`, then overridden from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::candidates::{SubnetPrefix, COMMON_PREFIXES, PRIORITY_OCTETS};
use crate::error::{DiscoveryError, Result};
use crate::url::BaseUrl;

pub const DEFAULT_PORT: u16 = 8000;
pub const HEALTH_PATH: &str = "/health";
pub const DEFAULT_CONCURRENCY: usize = 24;

const CONFIG_FILENAME: &str = "config.json";
pub(crate) const ENV_CONFIG_DIR: &str = "DRINKMASTER_CONFIG_DIR";
const ENV_API_URL: &str = "DRINKMASTER_API_URL";
const ENV_PORT: &str = "DRINKMASTER_DISCOVERY_PORT";

fn expand_tilde(path: &str) -> PathBuf {
    let s = path.trim();
    if s.starts_with('~') {
        let rest = s.trim_start_matches('~').trim_start_matches('/');
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = env_non_empty(ENV_CONFIG_DIR) {
        return expand_tilde(&override_dir);
    }
    #[cfg(windows)]
    {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| std::env::var("USERPROFILE").unwrap_or_default());
        PathBuf::from(appdata).join("DrinkMaster")
    }
    #[cfg(not(windows))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(xdg).join("drinkmaster")
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
                .join("drinkmaster")
        }
    }
}

pub fn get_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILENAME)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_hostnames() -> Vec<String> {
    vec!["raspberrypi.local".to_string(), "drinkmaster.local".to_string()]
}

fn default_priority_octets() -> Vec<u8> {
    PRIORITY_OCTETS.to_vec()
}

fn default_common_prefixes() -> Vec<String> {
    COMMON_PREFIXES.iter().map(|p| p.to_string()).collect()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_single_timeout_ms() -> u64 {
    900
}

fn default_scan_timeout_ms() -> u64 {
    700
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub port: u16,
    /// Build- or deploy-time fallback, probed right after the stored URL.
    pub fallback_url: Option<String>,
    pub hostnames: Vec<String>,
    pub priority_octets: Vec<u8>,
    pub common_prefixes: Vec<String>,
    pub concurrency: usize,
    /// Re-check of the URL already in use.
    pub cache_timeout_ms: u64,
    pub direct_timeout_ms: u64,
    pub priority_timeout_ms: u64,
    /// Per-probe deadline during bulk sweeps.
    pub scan_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            port: default_port(),
            fallback_url: None,
            hostnames: default_hostnames(),
            priority_octets: default_priority_octets(),
            common_prefixes: default_common_prefixes(),
            concurrency: default_concurrency(),
            cache_timeout_ms: default_single_timeout_ms(),
            direct_timeout_ms: default_single_timeout_ms(),
            priority_timeout_ms: default_single_timeout_ms(),
            scan_timeout_ms: default_scan_timeout_ms(),
        }
    }
}

impl DiscoveryConfig {
    /// Defaults, then `config.json` from [`config_dir`], then environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::read_file(&get_config_path());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// A missing or unreadable file yields the defaults.
    pub fn read_file(path: &Path) -> Self {
        if !path.exists() {
            return DiscoveryConfig::default();
        }
        match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                log::warn!("Ignoring unparsable config {}: {}", path.display(), e);
                DiscoveryConfig::default()
            }),
            Err(e) => {
                log::warn!("Cannot read config {}: {}", path.display(), e);
                DiscoveryConfig::default()
            }
        }
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DiscoveryError::Config(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| DiscoveryError::Config(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| DiscoveryError::Config(e.to_string()))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_non_empty(ENV_API_URL) {
            self.fallback_url = Some(url);
        }
        if let Some(port) = env_non_empty(ENV_PORT) {
            self.port = port
                .parse()
                .map_err(|_| DiscoveryError::Config(format!("{ENV_PORT}={port:?} is not a port number")))?;
        }
        Ok(())
    }

    /// Rejects settings that would make discovery silently useless.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(DiscoveryError::Config("port must not be 0".to_string()));
        }
        if self.concurrency == 0 {
            return Err(DiscoveryError::Config("concurrency must be at least 1".to_string()));
        }
        if [
            self.cache_timeout_ms,
            self.direct_timeout_ms,
            self.priority_timeout_ms,
            self.scan_timeout_ms,
        ]
        .contains(&0)
        {
            return Err(DiscoveryError::Config("probe timeouts must be positive".to_string()));
        }
        if let Some(octet) = self.priority_octets.iter().find(|o| **o == 0 || **o == 255) {
            return Err(DiscoveryError::Config(format!("priority octet {octet} is not a host address")));
        }
        for prefix in &self.common_prefixes {
            prefix
                .parse::<SubnetPrefix>()
                .map_err(|e| DiscoveryError::Config(format!("common prefix: {e}")))?;
        }
        for host in self.hostnames.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
            let bare = !host.contains(|c: char| c.is_whitespace() || ":/?#@".contains(c));
            if !bare || BaseUrl::parse(BaseUrl::from_host(host, self.port).as_str()).is_err() {
                return Err(DiscoveryError::Config(format!(
                    "hostname {host:?} must be a bare host name without scheme, port or path"
                )));
            }
        }
        self.fallback()?;
        Ok(())
    }

    /// The fallback URL, parsed. Blank counts as unset.
    pub fn fallback(&self) -> Result<Option<BaseUrl>> {
        match self.fallback_url.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => BaseUrl::parse(raw)
                .map(Some)
                .map_err(|e| DiscoveryError::Config(format!("fallback URL: {e}"))),
        }
    }

    pub fn subnet_prefixes(&self) -> Vec<SubnetPrefix> {
        self.common_prefixes
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect()
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_timeout_ms)
    }

    pub fn priority_timeout(&self) -> Duration {
        Duration::from_millis(self.priority_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}
