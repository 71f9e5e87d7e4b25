//! Best-effort internet reachability check.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{info, warn};

/// Default probe target: Cloudflare's public DNS resolver.
pub const DEFAULT_HOST: &str = "1.1.1.1";
pub const DEFAULT_PORT: u16 = 53;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Returns `true` when a TCP connection to `host:port` can be opened within
/// `timeout`.
///
/// Performs a single attempt per resolved address and never retries; a
/// resolution failure counts as offline.
pub fn is_online(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("Internet connectivity check failed: cannot resolve {host}: {e}");
            return false;
        }
    };

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => {
                info!(%addr, "Internet connectivity check succeeded");
                return true;
            }
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => warn!("Internet connectivity check failed: {e}"),
        None => warn!("Internet connectivity check failed: {host} resolved to no address"),
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn reachable_listener_is_online() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(is_online("127.0.0.1", port, Duration::from_secs(1)));
    }

    #[test]
    fn closed_port_is_offline() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(!is_online("127.0.0.1", port, Duration::from_millis(500)));
    }

    #[test]
    fn unresolvable_host_is_offline() {
        assert!(!is_online("host.invalid", 53, Duration::from_millis(500)));
    }
}
