use anyhow::Result;
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::nmcli::{NetworkManager, split_terse};

/// A network device as reported by `nmcli -t -f DEVICE,TYPE,STATE device`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub kind: String,
    pub state: String,
}

impl Device {
    pub fn is_wifi(&self) -> bool {
        self.kind == "wifi" && !self.name.is_empty()
    }
}

/// Parse terse `DEVICE,TYPE[,STATE]` lines, skipping malformed ones.
pub fn parse_device_list(stdout: &str) -> Vec<Device> {
    stdout
        .lines()
        .map(split_terse)
        .filter(|fields| fields.len() >= 2)
        .map(|fields| Device {
            name: fields[0].clone(),
            kind: fields[1].clone(),
            state: fields.get(2).cloned().unwrap_or_default(),
        })
        .collect()
}

/// List all WiFi interfaces on the system
pub fn list_wifi_interfaces(nm: &dyn NetworkManager) -> Result<Vec<Device>> {
    Ok(nm.list_devices()?.into_iter().filter(Device::is_wifi).collect())
}

/// Find the first WiFi interface, or `None` when there is none or the
/// device listing itself fails.
pub fn find_wireless_interface(nm: &dyn NetworkManager) -> Option<String> {
    match list_wifi_interfaces(nm) {
        Ok(interfaces) => {
            let found = interfaces.into_iter().next().map(|device| device.name);
            if let Some(name) = &found {
                info!(interface = %name, "Detected WiFi interface");
            }
            found
        }
        Err(e) => {
            warn!("Device listing failed: {e:#}");
            None
        }
    }
}

/// Resolve interface: use the configured name or auto-detect one.
pub fn resolve_interface(nm: &dyn NetworkManager, interface: Option<&str>) -> Result<String> {
    match interface {
        Some(name) => {
            let device = nm
                .list_devices()?
                .into_iter()
                .find(|d| d.name == name)
                .ok_or_else(|| ProvisionError::InterfaceNotFound(name.to_string()))?;
            if !device.is_wifi() {
                return Err(ProvisionError::NotWifiInterface(name.to_string()).into());
            }
            Ok(device.name)
        }
        None => find_wireless_interface(nm).ok_or_else(|| ProvisionError::NoWirelessInterface.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_listing() {
        let stdout = "eth0:ethernet:connected\nwlan0:wifi:disconnected\np2p-dev-wlan0:wifi-p2p:disconnected\nlo:loopback:unmanaged\nbroken\n";
        let devices = parse_device_list(stdout);

        assert_eq!(devices.len(), 4);
        assert_eq!(devices[1].name, "wlan0");
        assert!(devices[1].is_wifi());
        assert!(!devices[2].is_wifi());
        assert_eq!(devices[3].state, "unmanaged");
    }

    #[test]
    fn state_column_is_optional() {
        let devices = parse_device_list("wlan0:wifi\n");
        assert_eq!(devices[0].state, "");
        assert!(devices[0].is_wifi());
    }

    #[test]
    fn nameless_wifi_device_is_ignored() {
        let devices = parse_device_list(":wifi:unavailable\n");
        assert!(!devices[0].is_wifi());
    }
}
