use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("No WiFi interface found (is NetworkManager installed and running?)")]
    NoWirelessInterface,

    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("Interface '{0}' is not a WiFi device")]
    NotWifiInterface(String),

    #[error("Failed to execute nmcli: {0}")]
    NmcliExecution(String),

    #[error("Failed to start hotspot: {0}")]
    HotspotStart(String),

    #[error("A hotspot is already running on '{0}'")]
    HotspotActive(String),

    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Failed to persist credentials: {0}")]
    Persistence(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to fetch URL: {0}")]
    FetchFailed(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
