use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    geolocation::{DEFAULT_GEOLOCATION_URL, GeolocationProvider, IpGeolocator},
    model::Location,
    provider::ProviderId,
};

/// Environment variable that overrides the backend endpoint.
pub const ENDPOINT_ENV: &str = "NOWCAST_ENDPOINT";

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

/// Where "use my location" looks up the device position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self { enabled: true, endpoint: DEFAULT_GEOLOCATION_URL.to_string() }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base address of the dashboard backend.
    pub endpoint: Option<String>,

    /// Weather source, "backend" or "open-meteo". Absent means backend.
    pub source: Option<String>,

    /// Example TOML:
    /// [location]
    /// latitude = 40.7128
    /// longitude = -74.006
    /// label = "New York City"
    pub location: Location,

    pub geolocation: GeolocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            source: None,
            location: Location::default(),
            geolocation: GeolocationConfig::default(),
        }
    }
}

impl Config {
    /// Return the configured source as a strongly-typed ProviderId.
    pub fn source_id(&self) -> Result<ProviderId> {
        match self.source.as_deref() {
            None => Ok(ProviderId::Backend),
            Some(s) => ProviderId::try_from(s),
        }
    }

    pub fn set_source(&mut self, id: ProviderId) {
        self.source = Some(id.as_str().to_string());
    }

    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.as_ref().map(|e| e.trim().to_string()).filter(|e| !e.is_empty())
    }

    /// Geolocation capability for a session, or `None` when it is switched off.
    pub fn geolocation_provider(&self) -> Result<Option<Arc<dyn GeolocationProvider>>> {
        if !self.geolocation.enabled {
            return Ok(None);
        }
        let provider = IpGeolocator::new(self.geolocation.endpoint.clone())?;
        Ok(Some(Arc::new(provider)))
    }

    /// Load config from the platform config dir and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Load config from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.trim().is_empty()) {
            tracing::debug!(%endpoint, "backend endpoint overridden from environment");
            self.endpoint = Some(endpoint);
        }
    }

    /// Save config to the platform config dir.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "nowcast", "nowcast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
