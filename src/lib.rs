//! WiFi onboarding for a headless SmartLock device
//!
//! When the device boots without network access it opens a temporary access
//! point, serves a small web form for the operator's WiFi credentials,
//! writes them to the wpa_supplicant configuration, asks NetworkManager to
//! join the network and then takes the access point down again.
//!
//! # Modules
//!
//! - [`config`] - TOML settings for the hotspot, portal, probe and teardown timings
//! - [`connection`] - Joining the operator's network
//! - [`error`] - Custom error types for the library
//! - [`hotspot`] - Temporary access point lifecycle
//! - [`interface`] - WiFi interface discovery
//! - [`launcher`] - Fetch-or-fallback launcher for the device runtime
//! - [`nmcli`] - NetworkManager command surface and its `nmcli` implementation
//! - [`portal`] - Credential capture web portal
//! - [`probe`] - Internet reachability check
//! - [`provision`] - The onboarding workflow tying the pieces together
//! - [`shutdown`] - Deferred hotspot teardown and termination
//! - [`supplicant`] - wpa_supplicant credential store
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use smartlock_provision::{Nmcli, Settings, run_setup};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::load(None)?;
//! let outcome = run_setup(&settings, Arc::new(Nmcli::new()), CancellationToken::new()).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

/// Settings file handling (TOML, with defaults for every field).
pub mod config;

/// Stale-profile removal and network join.
pub mod connection;

/// Error module defining custom error types for the library.
/// Uses `thiserror` for ergonomic error handling.
pub mod error;

/// Access point start/stop with an explicit state machine.
pub mod hotspot;

/// Interface module for WiFi adapter discovery.
pub mod interface;

/// Launcher that prefers a freshly downloaded runtime script.
pub mod launcher;

/// The [`nmcli::NetworkManager`] capability trait and its `nmcli` backend.
pub mod nmcli;

/// Axum server for the setup form.
pub mod portal;

/// Best-effort TCP reachability probe.
pub mod probe;

/// Submission handling and the top-level setup flow.
pub mod provision;

/// Shutdown sequencing after a successful submission.
pub mod shutdown;

/// Append-only wpa_supplicant network store.
pub mod supplicant;

pub use config::Settings;
pub use error::ProvisionError;
pub use hotspot::{HotspotController, HotspotSession, HotspotState};
pub use interface::{Device, find_wireless_interface, list_wifi_interfaces, resolve_interface};
pub use nmcli::{NetworkManager, Nmcli};
pub use provision::{CredentialSubmission, Provisioner, ProvisioningOutcome, SetupExit, run_setup};
pub use shutdown::{ShutdownHandle, ShutdownSequencer, ShutdownTimings};
pub use supplicant::{NetworkRecord, PersistOutcome, SupplicantConfig};
