//! NetworkManager command surface.
//!
//! Every network mutation the provisioning flow performs goes through the
//! [`NetworkManager`] trait. [`Nmcli`] implements it by shelling out to
//! `nmcli` in terse mode; tests substitute an in-memory fake so the
//! onboarding workflow can run without radio hardware.
//!
//! # Requirements
//!
//! - NetworkManager must be installed and running
//! - The `nmcli` command must be available in PATH
//! - The process must be allowed to manage connections (usually root)

use anyhow::{Context, Result};
use std::process::{Command, Output};
use tracing::debug;

use crate::error::ProvisionError;
use crate::interface::{Device, parse_device_list};

/// Operations the provisioning flow needs from the OS network manager.
///
/// All calls are blocking; async callers run them on the blocking pool.
pub trait NetworkManager: Send + Sync + 'static {
    /// List every network device with its type and state.
    fn list_devices(&self) -> Result<Vec<Device>>;

    /// Put the interface under NetworkManager control.
    fn set_managed(&self, interface: &str) -> Result<()>;

    /// Bring up an access point with the given SSID and password.
    fn start_access_point(&self, interface: &str, ssid: &str, password: &str) -> Result<()>;

    /// Name of the active connection profile bound to `interface`, if any.
    fn active_connection(&self, interface: &str) -> Result<Option<String>>;

    /// Bring a connection profile down.
    fn stop_connection(&self, profile: &str) -> Result<()>;

    /// Disconnect a device regardless of which profile is active on it.
    fn disconnect_device(&self, interface: &str) -> Result<()>;

    /// Delete a saved connection profile.
    fn delete_profile(&self, profile: &str) -> Result<()>;

    /// Join a WPA network; the external tool performs the association.
    fn join_network(&self, interface: &str, ssid: &str, password: &str) -> Result<()>;
}

/// [`NetworkManager`] backed by the `nmcli` binary.
#[derive(Debug, Clone, Default)]
pub struct Nmcli;

impl Nmcli {
    pub fn new() -> Self {
        Nmcli
    }

    fn execute(&self, args: &[&str]) -> Result<Output> {
        debug!(command = %redact(args), "Executing nmcli");
        Command::new("nmcli")
            .args(args)
            .output()
            .with_context(|| exec_context(args))
    }

    /// Run a command and return its stdout, mapping a non-zero exit to
    /// [`ProvisionError::NmcliExecution`].
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.execute(args)?;
        if !output.status.success() {
            return Err(ProvisionError::NmcliExecution(failure_message(&output)).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl NetworkManager for Nmcli {
    fn list_devices(&self) -> Result<Vec<Device>> {
        let stdout = self.run(&["-t", "-f", "DEVICE,TYPE,STATE", "device"])?;
        Ok(parse_device_list(&stdout))
    }

    fn set_managed(&self, interface: &str) -> Result<()> {
        self.run(&["device", "set", interface, "managed", "yes"])?;
        Ok(())
    }

    fn start_access_point(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        let output = self.execute(&[
            "device", "wifi", "hotspot", "ifname", interface, "ssid", ssid, "password", password,
        ])?;
        if !output.status.success() {
            return Err(ProvisionError::HotspotStart(failure_message(&output)).into());
        }
        Ok(())
    }

    fn active_connection(&self, interface: &str) -> Result<Option<String>> {
        let stdout = self.run(&["-t", "-f", "NAME,DEVICE", "connection", "show", "--active"])?;
        Ok(parse_active_connection(&stdout, interface))
    }

    fn stop_connection(&self, profile: &str) -> Result<()> {
        self.run(&["connection", "down", profile])?;
        Ok(())
    }

    fn disconnect_device(&self, interface: &str) -> Result<()> {
        self.run(&["device", "disconnect", interface])?;
        Ok(())
    }

    fn delete_profile(&self, profile: &str) -> Result<()> {
        self.run(&["connection", "delete", profile])?;
        Ok(())
    }

    fn join_network(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        let output = self.execute(&[
            "device", "wifi", "connect", ssid, "password", password, "ifname", interface,
        ])?;
        if !output.status.success() {
            return Err(ProvisionError::ConnectionFailed(failure_message(&output)).into());
        }
        Ok(())
    }
}

/// Error text of a failed command: stderr when present, stdout otherwise.
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let message = if stderr.trim().is_empty() { stdout } else { stderr };
    message.trim().to_string()
}

/// Render an argument list for logging with every `password` value masked.
pub fn redact(args: &[&str]) -> String {
    let mut rendered = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            rendered.push("********");
            mask_next = false;
        } else {
            rendered.push(*arg);
            mask_next = *arg == "password";
        }
    }
    rendered.join(" ")
}

fn exec_context(args: &[&str]) -> String {
    format!("Failed to execute nmcli {}", redact(args))
}

/// Split one line of `nmcli -t` output into fields.
///
/// Terse mode separates fields with `:` and escapes literal colons and
/// backslashes inside values as `\:` and `\\`.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

/// Find the profile bound to `device` in `NAME,DEVICE` terse output.
pub fn parse_active_connection(stdout: &str, device: &str) -> Option<String> {
    stdout
        .lines()
        .map(split_terse)
        .find(|fields| fields.len() >= 2 && fields[1] == device && !fields[0].is_empty())
        .map(|mut fields| fields.swap_remove(0))
}
