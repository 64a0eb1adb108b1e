//! Configuration types for Pairgate

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP port when `PORT` is not set
pub const DEFAULT_PORT: u16 = 3000;

/// Default bounded wait for the first pairing token
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Name of the credential file the messaging client persists
pub const CREDENTIALS_FILE: &str = "auth_info.json";

/// Main configuration for Pairgate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address
    pub host: IpAddr,
    /// Server port
    pub port: u16,
    /// Directory holding the messaging client's session files
    pub session_dir: PathBuf,
    /// Directory served as static assets
    pub public_dir: PathBuf,
    /// Directory for temporary download archives
    pub archive_dir: PathBuf,
    /// External messaging client program
    pub bridge_program: String,
    /// How long `/pair` waits for a QR or pairing code
    pub handshake_timeout: Duration,
    /// Echo QR payloads to the terminal
    pub print_qr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            session_dir: PathBuf::from("session"),
            public_dir: PathBuf::from("public"),
            archive_dir: std::env::temp_dir(),
            bridge_program: "pairgate-bridge".to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            print_qr: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set bind address
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set session directory
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }

    /// Builder pattern: set public assets directory
    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    /// Builder pattern: set archive directory
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = dir.into();
        self
    }

    /// Builder pattern: set bridge program
    pub fn with_bridge_program(mut self, program: impl Into<String>) -> Self {
        self.bridge_program = program.into();
        self
    }

    /// Builder pattern: set handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Builder pattern: echo QR payloads to the terminal
    pub fn with_print_qr(mut self, print_qr: bool) -> Self {
        self.print_qr = print_qr;
        self
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.session_dir, PathBuf::from("session"));
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_port(8080)
            .with_session_dir("/tmp/sess")
            .with_handshake_timeout(Duration::from_secs(10))
            .with_print_qr(true);

        assert_eq!(config.port, 8080);
        assert_eq!(config.session_dir, PathBuf::from("/tmp/sess"));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert!(config.print_qr);
    }
}
