//! External collaborator interfaces.
//!
//! The engine only sees these traits; the HTTP clients in the submodules
//! are the production implementations.

pub mod solar;
pub mod topology;
pub mod weather;

pub use solar::SolarForecastClient;
pub use topology::TopologyClient;
pub use weather::WeatherClient;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::{AssetInventory, SolarAsset};
use crate::error::ProviderError;

/// One sample of the weather series for a coordinate pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSample {
    pub timestamp: DateTime<FixedOffset>,
    pub wind_speed_ms: f64,
    pub air_pressure_hpa: f64,
    pub air_humidity_percent: f64,
    pub temperature_c: f64,
}

/// Master data about the plant topology: activity, owners, assets.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    async fn is_active_plant(&self, plant_id: &str) -> Result<bool, ProviderError>;

    async fn list_households(&self, plant_id: &str) -> Result<Vec<String>, ProviderError>;

    async fn list_decentralized_plants(&self, plant_id: &str)
        -> Result<Vec<String>, ProviderError>;

    /// All producing assets of one owner (household or decentralized plant).
    async fn list_assets(&self, owner_id: &str) -> Result<AssetInventory, ProviderError>;
}

/// Weather series lookup for a coordinate pair.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn get_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<WeatherSample>, ProviderError>;
}

/// Whole-horizon solar forecast for one installation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SolarForecastProvider: Send + Sync {
    /// Returns one potential value (kW) per planning period, aligned
    /// one-to-one with the 97 periods of the horizon.
    async fn get_solar_forecast(
        &self,
        reference_time: DateTime<FixedOffset>,
        asset: &SolarAsset,
    ) -> Result<Vec<f64>, ProviderError>;
}
