//! Process configuration, taken from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;

/// Environment variable holding the listening port.
pub const PORT_VAR: &str = "SERVERPORT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid SERVERPORT value {0:?}: expected a port number")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Always loopback; the service is only reachable from the local host.
    pub host: IpAddr,
    /// `0` lets the OS pick a free port.
    pub port: u16,
}

impl Config {
    pub fn new(port: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_port_value(std::env::var(PORT_VAR).ok().as_deref())
    }

    /// Build a config from a raw port value. A missing or blank value selects
    /// an ephemeral port.
    pub fn from_port_value(raw: Option<&str>) -> Result<Self, ConfigError> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Ok(Self::new(0));
        }
        raw.parse::<u16>()
            .map(Self::new)
            .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(0)
    }
}
