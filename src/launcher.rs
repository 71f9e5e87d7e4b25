//! Runtime launcher.
//!
//! When the device is online the latest control script is fetched from the
//! configured URLs; otherwise, or when every download fails, the script
//! shipped next to the binary runs instead.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::ProvisionError;
use crate::probe;

pub const DEFAULT_PRIMARY_URL: &str = "https://raw.githubusercontent.com/hertz786/IOT/main/gpio_main.py";
pub const DEFAULT_ADDITIONAL_URL: &str = "https://raw.githubusercontent.com/hertz786/IOT/master/gpio_main.py";

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub primary_url: String,
    pub additional_urls: Vec<String>,
    pub timeout: Duration,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub token: Option<String>,
    pub probe_host: String,
    pub probe_port: u16,
    pub local_script: PathBuf,
    pub cloud_script: PathBuf,
    pub interpreter: String,
    /// Working directory of the launched script.
    pub workdir: PathBuf,
}

impl LaunchConfig {
    /// Defaults rooted at `script_dir`: `gpio_main.py` is the local script,
    /// downloads land in `gpio_main_cloud.py`.
    pub fn new(script_dir: &Path) -> Self {
        Self {
            primary_url: DEFAULT_PRIMARY_URL.to_string(),
            additional_urls: vec![DEFAULT_ADDITIONAL_URL.to_string()],
            timeout: Duration::from_secs(15),
            token: None,
            probe_host: probe::DEFAULT_HOST.to_string(),
            probe_port: probe::DEFAULT_PORT,
            local_script: script_dir.join("gpio_main.py"),
            cloud_script: script_dir.join("gpio_main_cloud.py"),
            interpreter: "python3".to_string(),
            workdir: script_dir.to_path_buf(),
        }
    }
}

/// Download candidates in order, trimmed and without duplicates.
pub fn cloud_source_urls(primary: &str, additional: &[String]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in std::iter::once(primary).chain(additional.iter().map(String::as_str)) {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|seen| seen == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Fetch `url` into `output`, replacing it atomically and marking it
/// executable.
pub fn download_script(url: &str, output: &Path, timeout: Duration, token: Option<&str>) -> Result<()> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let mut request = agent.get(url);
    if let Some(token) = token {
        request = request.set("Authorization", &format!("Bearer {token}"));
    }

    let content = request
        .call()
        .map_err(|e| ProvisionError::FetchFailed(e.to_string()))?
        .into_string()
        .map_err(|e| ProvisionError::FetchFailed(e.to_string()))?;

    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());
    let staging = output.with_file_name(format!(".{file_name}.download"));

    fs::write(&staging, &content)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    fs::rename(&staging, output)
        .with_context(|| format!("Failed to move download into {}", output.display()))?;
    make_executable(output)?;

    info!("Cloud script downloaded to {}", output.display());
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Pick the script to run: a fresh download when `online`, else the local
/// fallback, else nothing.
pub fn select_script(config: &LaunchConfig, online: bool) -> Option<PathBuf> {
    if online {
        for url in cloud_source_urls(&config.primary_url, &config.additional_urls) {
            info!("Attempting cloud script download from {url}");
            match download_script(&url, &config.cloud_script, config.timeout, config.token.as_deref()) {
                Ok(()) => {
                    info!("Using cloud script: {}", config.cloud_script.display());
                    return Some(config.cloud_script.clone());
                }
                Err(e) => error!("Cloud script download failed: {e:#}"),
            }
        }
        warn!("Cloud script unavailable, falling back to local script");
    }

    if config.local_script.exists() {
        info!("Using local fallback script: {}", config.local_script.display());
        return Some(config.local_script.clone());
    }

    error!(
        "No runnable script found. Expected local script at {}",
        config.local_script.display()
    );
    None
}

/// Run `script` with `interpreter` and return its exit code, or 1 when it
/// could not be launched or ended without one.
pub fn run_script(interpreter: &str, script: &Path, workdir: &Path) -> i32 {
    info!("Launching runtime: {}", script.display());
    match Command::new(interpreter).arg(script).current_dir(workdir).status() {
        Ok(status) => {
            let code = status.code().unwrap_or(1);
            info!("Runtime exited with code {code}");
            code
        }
        Err(e) => {
            error!("Failed to execute runtime {}: {e}", script.display());
            1
        }
    }
}

pub fn run(config: &LaunchConfig) -> i32 {
    info!("=== SmartLock bootstrap start ===");
    let online = probe::is_online(&config.probe_host, config.probe_port, probe::DEFAULT_TIMEOUT);

    let Some(script) = select_script(config, online) else {
        error!("Bootstrap stopping because no script could be selected");
        return 1;
    };

    let code = run_script(&config.interpreter, &script, &config.workdir);
    info!("=== SmartLock bootstrap stop (code={code}) ===");
    code
}
