//! Joining the operator's network.
//!
//! A profile left over from an earlier attempt with the same SSID would make
//! NetworkManager reuse stale credentials, so it is deleted first.

use anyhow::Result;
use tracing::{debug, info};

use crate::error::ProvisionError;
use crate::nmcli::NetworkManager;

/// Connects `interface` to `ssid`.
///
/// # Commands Executed
/// ```bash
/// nmcli connection delete <ssid>        # failure ignored
/// nmcli device wifi connect <ssid> password <password> ifname <interface>
/// ```
///
/// # Returns
/// - `Ok(())` once nmcli reports the association succeeded
/// - `Err(ProvisionError::ConnectionFailed)` otherwise; there is no retry
pub fn connect(nm: &dyn NetworkManager, interface: &str, ssid: &str, password: &str) -> Result<()> {
    if let Err(e) = nm.delete_profile(ssid) {
        debug!("No stale profile '{ssid}' removed: {e:#}");
    }

    nm.join_network(interface, ssid, password)
        .map_err(|e| -> anyhow::Error {
            match e.downcast::<ProvisionError>() {
                Ok(failed @ ProvisionError::ConnectionFailed(_)) => failed.into(),
                Ok(other) => ProvisionError::ConnectionFailed(other.to_string()).into(),
                Err(other) => ProvisionError::ConnectionFailed(format!("{other:#}")).into(),
            }
        })?;

    info!(%ssid, %interface, "Connected to WiFi");
    Ok(())
}
