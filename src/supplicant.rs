//! wpa_supplicant configuration store.
//!
//! Credentials are appended as `network={...}` blocks. Existing content is
//! never rewritten, and an SSID that already has a block is left alone, so
//! submitting the same network twice writes exactly one record.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ProvisionError;

pub const DEFAULT_PATH: &str = "/etc/wpa_supplicant/wpa_supplicant.conf";

/// Result of a successful [`SupplicantConfig::persist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Appended,
    AlreadyPresent,
}

/// One `network={...}` block, values unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub ssid: String,
    pub psk: Option<String>,
    pub key_mgmt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SupplicantConfig {
    path: PathBuf,
}

/// Escape `\` and `"` so a value can sit inside a quoted directive.
pub fn escape_wpa(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape_wpa(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn ssid_directive(ssid: &str) -> String {
    format!("ssid=\"{}\"", escape_wpa(ssid))
}

/// The block appended for a new network.
pub fn network_block(ssid: &str, password: &str) -> String {
    format!(
        "\nnetwork={{\n    {}\n    psk=\"{}\"\n    key_mgmt=WPA-PSK\n}}\n",
        ssid_directive(ssid),
        escape_wpa(password)
    )
}

/// Value of a `key="value"` or `key=value` directive.
fn directive_value(line: &str, key: &str) -> Option<String> {
    let value = line.strip_prefix(key)?.strip_prefix('=')?;
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(quoted) => Some(unescape_wpa(quoted)),
        None => Some(value.to_string()),
    }
}

/// Parse every `network={...}` block in `content`.
pub fn parse_networks(content: &str) -> Vec<NetworkRecord> {
    let mut records = Vec::new();
    let mut current: Option<(Option<String>, Option<String>, Option<String>)> = None;

    for line in content.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        if line == "network={" {
            current = Some((None, None, None));
            continue;
        }
        let Some((ssid, psk, key_mgmt)) = current.as_mut() else {
            continue;
        };
        if line == "}" {
            if let Some((Some(ssid), psk, key_mgmt)) = current.take() {
                records.push(NetworkRecord { ssid, psk, key_mgmt });
            }
        } else if let Some(value) = directive_value(line, "ssid") {
            *ssid = Some(value);
        } else if let Some(value) = directive_value(line, "psk") {
            *psk = Some(value);
        } else if let Some(value) = directive_value(line, "key_mgmt") {
            *key_mgmt = Some(value);
        }
    }

    records
}

impl SupplicantConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file content; a missing file reads as empty and invalid UTF-8
    /// is decoded lossily.
    fn read_existing(&self) -> Result<String> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ProvisionError::Persistence(e.to_string()))
                .with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    /// Whether a block for `ssid` already exists.
    ///
    /// Single-line directives must match a whole line. A directive spanning
    /// lines can only come from a hand-edited file and is matched as a
    /// substring.
    pub fn contains(&self, ssid: &str) -> Result<bool> {
        let directive = ssid_directive(ssid);
        let content = self.read_existing()?;
        if directive.contains(['\n', '\r']) {
            return Ok(content.contains(&directive));
        }
        Ok(content.lines().any(|line| line.trim() == directive))
    }

    /// All network records currently in the file.
    pub fn networks(&self) -> Result<Vec<NetworkRecord>> {
        Ok(parse_networks(&self.read_existing()?))
    }

    /// Append a block for `ssid` unless one is already present.
    ///
    /// Values with control characters are refused: a line break would end
    /// the quoted value and let the rest become directives of its own.
    pub fn persist(&self, ssid: &str, password: &str) -> Result<PersistOutcome> {
        if ssid.chars().chain(password.chars()).any(char::is_control) {
            return Err(ProvisionError::Validation(
                "SSID and password must not contain control characters".to_string(),
            )
            .into());
        }
        if self.contains(ssid)? {
            info!(%ssid, "SSID already present in wpa_supplicant, skipping append");
            return Ok(PersistOutcome::AlreadyPresent);
        }

        self.append(&network_block(ssid, password))
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        info!(path = %self.path.display(), "WiFi credentials appended");
        Ok(PersistOutcome::Appended)
    }

    fn append(&self, block: &str) -> Result<(), ProvisionError> {
        let persistence = |e: std::io::Error| ProvisionError::Persistence(e.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persistence)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(persistence)?;
        file.write_all(block.as_bytes()).map_err(persistence)?;
        file.sync_all().map_err(persistence)
    }
}
