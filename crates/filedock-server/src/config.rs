use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_PORT: u16 = 3710;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 86_400;

/// Listener address and sweep cadence.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub refresh_interval: Duration,
    pub purge_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            purge_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: std::env::var("FILEDOCK_BIND").unwrap_or(defaults.bind),
            port: env_parse("FILEDOCK_PORT").unwrap_or(defaults.port),
            refresh_interval: env_parse("FILEDOCK_REFRESH_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_interval),
            purge_interval: env_parse("FILEDOCK_PURGE_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.purge_interval),
        }
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid FILEDOCK_BIND address {:?}", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
