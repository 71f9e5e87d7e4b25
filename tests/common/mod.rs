#![allow(dead_code)]

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use smartlock_provision::portal::PortalState;
use smartlock_provision::{
    Device, HotspotController, NetworkManager, ProvisionError, Provisioner, ShutdownSequencer,
    ShutdownTimings, SupplicantConfig,
};

pub const HOTSPOT_SSID: &str = "SmartLock-Setup";
pub const HOTSPOT_PASSWORD: &str = "electroniccliks";
pub const HOTSPOT_PROFILE: &str = "Hotspot-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListDevices,
    SetManaged(String),
    StartAccessPoint {
        interface: String,
        ssid: String,
        password: String,
    },
    ActiveConnection(String),
    StopConnection(String),
    DisconnectDevice(String),
    DeleteProfile(String),
    JoinNetwork {
        interface: String,
        ssid: String,
        password: String,
    },
}

/// In-memory NetworkManager that records every call.
#[derive(Default)]
pub struct FakeNetworkManager {
    devices: Vec<Device>,
    hotspot_profile: Option<String>,
    fail_listing: bool,
    fail_start: bool,
    fail_stop: bool,
    join_failures: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

fn device(name: &str, kind: &str, state: &str) -> Device {
    Device {
        name: name.to_string(),
        kind: kind.to_string(),
        state: state.to_string(),
    }
}

impl FakeNetworkManager {
    pub fn with_wifi(interface: &str) -> Self {
        Self {
            devices: vec![
                device("eth0", "ethernet", "unavailable"),
                device(interface, "wifi", "disconnected"),
                device("lo", "loopback", "unmanaged"),
            ],
            hotspot_profile: Some(HOTSPOT_PROFILE.to_string()),
            ..Default::default()
        }
    }

    pub fn without_wifi() -> Self {
        Self {
            devices: vec![device("eth0", "ethernet", "unavailable")],
            ..Default::default()
        }
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn unnamed_hotspot(mut self) -> Self {
        self.hotspot_profile = None;
        self
    }

    pub fn failing_joins(self, count: usize) -> Self {
        self.join_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn joins(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::JoinNetwork { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl NetworkManager for FakeNetworkManager {
    fn list_devices(&self) -> Result<Vec<Device>> {
        self.record(Call::ListDevices);
        if self.fail_listing {
            return Err(ProvisionError::NmcliExecution("NetworkManager is not running".into()).into());
        }
        Ok(self.devices.clone())
    }

    fn set_managed(&self, interface: &str) -> Result<()> {
        self.record(Call::SetManaged(interface.to_string()));
        Ok(())
    }

    fn start_access_point(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        self.record(Call::StartAccessPoint {
            interface: interface.to_string(),
            ssid: ssid.to_string(),
            password: password.to_string(),
        });
        if self.fail_start {
            return Err(ProvisionError::HotspotStart("device does not support AP mode".into()).into());
        }
        Ok(())
    }

    fn active_connection(&self, interface: &str) -> Result<Option<String>> {
        self.record(Call::ActiveConnection(interface.to_string()));
        Ok(self.hotspot_profile.clone())
    }

    fn stop_connection(&self, profile: &str) -> Result<()> {
        self.record(Call::StopConnection(profile.to_string()));
        if self.fail_stop {
            return Err(ProvisionError::NmcliExecution(format!("unknown connection '{profile}'")).into());
        }
        Ok(())
    }

    fn disconnect_device(&self, interface: &str) -> Result<()> {
        self.record(Call::DisconnectDevice(interface.to_string()));
        Ok(())
    }

    fn delete_profile(&self, profile: &str) -> Result<()> {
        self.record(Call::DeleteProfile(profile.to_string()));
        Err(ProvisionError::NmcliExecution(format!("unknown connection '{profile}'")).into())
    }

    fn join_network(&self, interface: &str, ssid: &str, password: &str) -> Result<()> {
        self.record(Call::JoinNetwork {
            interface: interface.to_string(),
            ssid: ssid.to_string(),
            password: password.to_string(),
        });
        let remaining = self.join_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.join_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProvisionError::ConnectionFailed("Secrets were required".into()).into());
        }
        Ok(())
    }
}

pub fn quick_timings() -> ShutdownTimings {
    ShutdownTimings {
        response_timeout: Duration::from_secs(2),
        linger: Duration::ZERO,
        exit_delay: Duration::ZERO,
    }
}

/// A started hotspot on `wlan0` with a provisioner and an armed-able
/// shutdown sequencer, all backed by the given fake.
pub struct Fixture {
    pub fake: Arc<FakeNetworkManager>,
    pub dir: TempDir,
    pub supplicant_path: PathBuf,
    pub hotspot: Arc<HotspotController>,
    pub provisioner: Arc<Provisioner>,
    pub shutdown: Arc<ShutdownSequencer>,
    pub terminate: CancellationToken,
}

impl Fixture {
    pub fn new(fake: FakeNetworkManager) -> Self {
        Self::with_timings(fake, quick_timings())
    }

    pub fn with_timings(fake: FakeNetworkManager, timings: ShutdownTimings) -> Self {
        let fake = Arc::new(fake);
        let nm: Arc<dyn NetworkManager> = fake.clone();
        let dir = tempfile::tempdir().unwrap();
        let supplicant_path = dir.path().join("wpa_supplicant").join("wpa_supplicant.conf");

        let hotspot = Arc::new(HotspotController::new(nm.clone()));
        let session = hotspot.start("wlan0", HOTSPOT_SSID, HOTSPOT_PASSWORD).unwrap();
        let provisioner = Arc::new(Provisioner::new(
            nm,
            "wlan0".to_string(),
            SupplicantConfig::new(&supplicant_path),
        ));
        let terminate = CancellationToken::new();
        let shutdown = Arc::new(ShutdownSequencer::new(
            hotspot.clone(),
            session,
            timings,
            terminate.clone(),
        ));

        Self {
            fake,
            dir,
            supplicant_path,
            hotspot,
            provisioner,
            shutdown,
            terminate,
        }
    }

    pub fn state(&self) -> PortalState {
        PortalState::new(self.provisioner.clone(), self.shutdown.clone())
    }

    pub fn supplicant_content(&self) -> Option<String> {
        std::fs::read_to_string(&self.supplicant_path).ok()
    }
}
