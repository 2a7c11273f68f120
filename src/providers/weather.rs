//! HTTP client for the weather service.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;
use crate::providers::{WeatherProvider, WeatherSample};

const PROVIDER: &str = "weather";

pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn get_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<WeatherSample>, ProviderError> {
        let url = format!(
            "{}/weather?lat={:.6}&lon={:.6}",
            self.base_url, latitude, longitude
        );
        debug!(%url, "fetching weather series");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: response.status().as_u16(),
            });
        }

        let dtos: Vec<WeatherDto> = response.json().await.map_err(|e| ProviderError::Payload {
            provider: PROVIDER,
            detail: e.to_string(),
        })?;

        Ok(dtos.into_iter().map(WeatherDto::into_sample).collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeatherDto {
    timestamp: DateTime<FixedOffset>,
    wind_speed: f64,
    air_pressure: f64,
    air_humidity: f64,
    temperature_celsius: f64,
}

impl WeatherDto {
    fn into_sample(self) -> WeatherSample {
        WeatherSample {
            timestamp: self.timestamp,
            wind_speed_ms: self.wind_speed,
            air_pressure_hpa: self.air_pressure,
            air_humidity_percent: self.air_humidity,
            temperature_c: self.temperature_celsius,
        }
    }
}
