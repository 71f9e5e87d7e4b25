//! The onboarding workflow.
//!
//! [`run_setup`] drives the whole flow: probe, interface discovery, hotspot,
//! portal. [`Provisioner`] holds what a credential submission needs (network
//! manager handle, interface, supplicant store) and turns one submission
//! into a [`ProvisioningOutcome`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Settings;
use crate::connection;
use crate::error::ProvisionError;
use crate::hotspot::{HotspotController, HotspotSession};
use crate::interface::resolve_interface;
use crate::nmcli::NetworkManager;
use crate::portal::{self, PortalState};
use crate::probe;
use crate::shutdown::ShutdownSequencer;
use crate::supplicant::{PersistOutcome, SupplicantConfig};

/// Credentials from one portal request, trimmed, non-empty and free of
/// control characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSubmission {
    ssid: String,
    password: String,
}

impl CredentialSubmission {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ProvisionError> {
        let ssid = ssid.trim();
        let password = password.trim();
        if ssid.is_empty() || password.is_empty() {
            return Err(ProvisionError::Validation(
                "SSID and password are required".to_string(),
            ));
        }
        if ssid.chars().chain(password.chars()).any(char::is_control) {
            return Err(ProvisionError::Validation(
                "SSID and password must not contain control characters".to_string(),
            ));
        }
        Ok(Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    Success,
    ValidationError,
    PersistenceError,
    ConnectionError,
}

impl ProvisioningOutcome {
    /// Text shown to the operator. Failures stay generic on purpose; the
    /// details go to the log.
    pub fn message(self) -> &'static str {
        match self {
            ProvisioningOutcome::Success => "Wi-Fi connected successfully. Hotspot is shutting down.",
            ProvisioningOutcome::ValidationError => "SSID and password are required.",
            ProvisioningOutcome::PersistenceError | ProvisioningOutcome::ConnectionError => {
                "Connection failed. Please verify credentials and retry."
            }
        }
    }

    pub fn is_error(self) -> bool {
        self != ProvisioningOutcome::Success
    }
}

pub struct Provisioner {
    nm: Arc<dyn NetworkManager>,
    interface: String,
    supplicant: SupplicantConfig,
}

impl Provisioner {
    pub fn new(nm: Arc<dyn NetworkManager>, interface: String, supplicant: SupplicantConfig) -> Self {
        Self {
            nm,
            interface,
            supplicant,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn supplicant(&self) -> &SupplicantConfig {
        &self.supplicant
    }

    /// Validate, persist, then connect. Blocking.
    ///
    /// Persisted credentials are kept when the connection attempt fails; a
    /// resubmission finds them already present and goes straight on to
    /// connecting again.
    pub fn submit(&self, ssid: &str, password: &str) -> ProvisioningOutcome {
        let submission = match CredentialSubmission::new(ssid, password) {
            Ok(submission) => submission,
            Err(e) => {
                info!("Rejected submission: {e}");
                return ProvisioningOutcome::ValidationError;
            }
        };

        match self.supplicant.persist(submission.ssid(), submission.password()) {
            Ok(PersistOutcome::Appended) | Ok(PersistOutcome::AlreadyPresent) => {}
            Err(e) => {
                error!("WiFi provisioning failed: {e:#}");
                return ProvisioningOutcome::PersistenceError;
            }
        }

        if let Err(e) = connection::connect(
            self.nm.as_ref(),
            &self.interface,
            submission.ssid(),
            submission.password(),
        ) {
            error!("WiFi provisioning failed: {e:#}");
            return ProvisioningOutcome::ConnectionError;
        }

        ProvisioningOutcome::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupExit {
    /// The device was online already; nothing was touched.
    AlreadyOnline,
    /// Credentials were accepted and the hotspot has been torn down.
    Provisioned,
}

/// Run the provisioning flow until it completes.
///
/// Returns once `terminate` is cancelled, which the shutdown sequence does
/// after a successful submission. Fails without binding the portal when no
/// WiFi interface exists or the hotspot cannot be started.
pub async fn run_setup(
    settings: &Settings,
    nm: Arc<dyn NetworkManager>,
    terminate: CancellationToken,
) -> Result<SetupExit> {
    let target = settings.probe.clone();
    let online = tokio::task::spawn_blocking(move || {
        probe::is_online(&target.host, target.port, target.timeout())
    })
    .await?;
    if online {
        info!("Internet already connected. WiFi provisioning skipped.");
        return Ok(SetupExit::AlreadyOnline);
    }

    let hotspot = Arc::new(HotspotController::new(Arc::clone(&nm)));
    let session: HotspotSession = {
        let nm = Arc::clone(&nm);
        let hotspot = Arc::clone(&hotspot);
        let configured = settings.interface.clone();
        let ap = settings.hotspot.clone();
        tokio::task::spawn_blocking(move || -> Result<HotspotSession> {
            let interface = resolve_interface(nm.as_ref(), configured.as_deref())?;
            hotspot.start(&interface, &ap.ssid, &ap.password)
        })
        .await??
    };

    let addr = format!("{}:{}", settings.portal.host, settings.portal.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            let hotspot = Arc::clone(&hotspot);
            tokio::task::spawn_blocking(move || hotspot.stop(session)).await?;
            return Err(e).with_context(|| format!("Failed to bind portal on {addr}"));
        }
    };

    let provisioner = Arc::new(Provisioner::new(
        nm,
        session.interface.clone(),
        SupplicantConfig::new(&settings.supplicant_path),
    ));
    let shutdown = Arc::new(ShutdownSequencer::new(
        hotspot,
        session,
        settings.shutdown.timings(),
        terminate.clone(),
    ));

    portal::serve(listener, PortalState::new(provisioner, shutdown), terminate).await?;
    Ok(SetupExit::Provisioned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_is_trimmed() {
        let submission = CredentialSubmission::new("  HomeWiFi ", "\thunter2\n").unwrap();
        assert_eq!(submission.ssid(), "HomeWiFi");
        assert_eq!(submission.password(), "hunter2");
    }

    #[test]
    fn blank_fields_are_rejected() {
        for (ssid, password) in [("", "x"), ("x", ""), ("   ", "secret"), ("HomeWiFi", " \t ")] {
            assert!(matches!(
                CredentialSubmission::new(ssid, password),
                Err(ProvisionError::Validation(_))
            ));
        }
    }

    #[test]
    fn embedded_line_breaks_are_rejected() {
        for (ssid, password) in [
            ("Home\nNet", "secret1"),
            ("Office", "x\"\n    key_mgmt=NONE\n#"),
            ("Office", "pass\rword"),
            ("Tab\tNet", "secret1"),
            ("Office", "nul\0byte"),
        ] {
            assert!(matches!(
                CredentialSubmission::new(ssid, password),
                Err(ProvisionError::Validation(_))
            ));
        }
    }

    #[test]
    fn failures_share_a_generic_message() {
        assert_eq!(
            ProvisioningOutcome::PersistenceError.message(),
            ProvisioningOutcome::ConnectionError.message()
        );
        assert!(!ProvisioningOutcome::Success.is_error());
        assert!(ProvisioningOutcome::ValidationError.is_error());
    }
}
