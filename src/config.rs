use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::rendezvous::RendezvousConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub forecast: ForecastConfig,
    pub rendezvous: RendezvousSettings,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    /// Fixed clock offset for the horizon start, in hours east of UTC.
    /// Not DST-aware on purpose.
    pub utc_offset_hours: i32,
}

impl ForecastConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            utc_offset_hours: self.utc_offset_hours,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendezvousSettings {
    pub deadline_minutes: u64,
    pub resolution_retention_minutes: u64,
}

impl RendezvousSettings {
    pub fn rendezvous_config(&self) -> RendezvousConfig {
        RendezvousConfig {
            deadline: Duration::from_secs(self.deadline_minutes * 60),
            resolution_retention: Duration::from_secs(self.resolution_retention_minutes * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub topology_base_url: String,
    pub weather_base_url: String,
    pub solar_base_url: String,
    pub http_timeout_seconds: u64,
}

impl ProvidersConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("VPP__").split("__"));
        let config: Config = figment.extract()?;

        if config.forecast.utc_offset_hours.abs() >= 24 {
            anyhow::bail!(
                "forecast.utc_offset_hours must be within +/-23, got {}",
                config.forecast.utc_offset_hours
            );
        }
        Ok(config)
    }
}
