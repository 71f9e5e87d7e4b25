use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ProvisionError;
use crate::shutdown::ShutdownTimings;
use crate::{probe, supplicant};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub supplicant_path: PathBuf,
    /// Use this interface instead of the first WiFi device nmcli reports.
    pub interface: Option<String>,
    pub hotspot: HotspotSettings,
    pub portal: PortalSettings,
    pub probe: ProbeSettings,
    pub shutdown: ShutdownSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotSettings {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownSettings {
    pub response_timeout_ms: u64,
    pub linger_ms: u64,
    pub exit_delay_ms: u64,
}

impl Default for HotspotSettings {
    fn default() -> Self {
        Self {
            ssid: "SmartLock-Setup".to_string(),
            password: "electroniccliks".to_string(),
        }
    }
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            host: probe::DEFAULT_HOST.to_string(),
            port: probe::DEFAULT_PORT,
            timeout_secs: probe::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        let timings = ShutdownTimings::default();
        Self {
            response_timeout_ms: timings.response_timeout.as_millis() as u64,
            linger_ms: timings.linger.as_millis() as u64,
            exit_delay_ms: timings.exit_delay.as_millis() as u64,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supplicant_path: PathBuf::from(supplicant::DEFAULT_PATH),
            interface: None,
            hotspot: HotspotSettings::default(),
            portal: PortalSettings::default(),
            probe: ProbeSettings::default(),
            shutdown: ShutdownSettings::default(),
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ShutdownSettings {
    pub fn timings(&self) -> ShutdownTimings {
        ShutdownTimings {
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            linger: Duration::from_millis(self.linger_ms),
            exit_delay: Duration::from_millis(self.exit_delay_ms),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from [`config_path`] when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hotspot.ssid.trim().is_empty() {
            return Err(ProvisionError::InvalidSettings("hotspot.ssid is empty".to_string()).into());
        }
        let len = self.hotspot.password.chars().count();
        if !(8..=63).contains(&len) {
            return Err(ProvisionError::InvalidSettings(format!(
                "hotspot.password must be 8 to 63 characters, got {len}"
            ))
            .into());
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("smartlock-provision").join("config.toml"))
}
