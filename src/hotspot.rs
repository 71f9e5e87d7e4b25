//! Temporary access point lifecycle.
//!
//! The controller walks `Idle → Starting → Active → Stopping → Idle` and
//! refuses a second start while a session is live, so at most one hotspot
//! exists per controller.

use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::nmcli::NetworkManager;

/// Profile label used when NetworkManager does not report the hotspot's
/// connection name.
pub const FALLBACK_PROFILE: &str = "Hotspot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// A running access point, handed back to [`HotspotController::stop`] to
/// tear it down.
#[derive(Debug, PartialEq, Eq)]
pub struct HotspotSession {
    pub interface: String,
    pub ssid: String,
    pub password: String,
    /// Connection profile created by NetworkManager for the access point.
    pub profile: String,
    /// `false` when `profile` is [`FALLBACK_PROFILE`] rather than a name
    /// NetworkManager reported.
    pub profile_known: bool,
}

pub struct HotspotController {
    nm: Arc<dyn NetworkManager>,
    state: Mutex<HotspotState>,
}

impl HotspotController {
    pub fn new(nm: Arc<dyn NetworkManager>) -> Self {
        Self {
            nm,
            state: Mutex::new(HotspotState::Idle),
        }
    }

    pub fn state(&self) -> HotspotState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, HotspotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: HotspotState) {
        *self.lock_state() = state;
    }

    /// Bring up an access point on `interface`.
    ///
    /// # Commands Executed
    /// ```bash
    /// nmcli device set <interface> managed yes
    /// nmcli device wifi hotspot ifname <interface> ssid <ssid> password <password>
    /// nmcli -t -f NAME,DEVICE connection show --active
    /// ```
    pub fn start(&self, interface: &str, ssid: &str, password: &str) -> Result<HotspotSession> {
        {
            let mut state = self.lock_state();
            if *state != HotspotState::Idle {
                return Err(ProvisionError::HotspotActive(interface.to_string()).into());
            }
            *state = HotspotState::Starting;
        }

        if let Err(e) = self.nm.set_managed(interface) {
            warn!("Could not set {interface} as managed: {e:#}");
        }

        if let Err(e) = self.nm.start_access_point(interface, ssid, password) {
            self.set_state(HotspotState::Idle);
            return Err(match e.downcast::<ProvisionError>() {
                Ok(hotspot @ ProvisionError::HotspotStart(_)) => hotspot.into(),
                Ok(other) => ProvisionError::HotspotStart(other.to_string()).into(),
                Err(other) => ProvisionError::HotspotStart(format!("{other:#}")).into(),
            });
        }

        let discovered = match self.nm.active_connection(interface) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Could not query the hotspot connection on {interface}: {e:#}");
                None
            }
        };
        let profile_known = discovered.is_some();
        let profile = discovered.unwrap_or_else(|| FALLBACK_PROFILE.to_string());

        self.set_state(HotspotState::Active);
        info!(%ssid, %interface, %profile, "Hotspot started");

        Ok(HotspotSession {
            interface: interface.to_string(),
            ssid: ssid.to_string(),
            password: password.to_string(),
            profile,
            profile_known,
        })
    }

    /// Tear the access point down. Failures are logged, never returned: this
    /// runs on the way out of the process and must not hold it up.
    pub fn stop(&self, session: HotspotSession) {
        self.set_state(HotspotState::Stopping);

        match self.nm.stop_connection(&session.profile) {
            Ok(()) => info!(profile = %session.profile, "Hotspot connection stopped"),
            Err(e) if !session.profile_known => {
                warn!(
                    "Stopping profile '{}' failed ({e:#}), disconnecting {} instead",
                    session.profile, session.interface
                );
                match self.nm.disconnect_device(&session.interface) {
                    Ok(()) => info!(interface = %session.interface, "Hotspot device disconnected"),
                    Err(e) => warn!("Disconnecting {} failed: {e:#}", session.interface),
                }
            }
            Err(e) => warn!("Stopping hotspot profile '{}' failed: {e:#}", session.profile),
        }

        self.set_state(HotspotState::Idle);
    }
}
