//! HTTP client for the solar forecast service.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::SolarAsset;
use crate::error::ProviderError;
use crate::providers::SolarForecastProvider;

const PROVIDER: &str = "solar";

pub struct SolarForecastClient {
    client: Client,
    base_url: String,
}

impl SolarForecastClient {
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
impl SolarForecastProvider for SolarForecastClient {
    async fn get_solar_forecast(
        &self,
        reference_time: DateTime<FixedOffset>,
        asset: &SolarAsset,
    ) -> Result<Vec<f64>, ProviderError> {
        let url = format!("{}/forecast", self.base_url);
        debug!(%url, asset_id = %asset.id, "fetching solar forecast series");

        let request = SolarForecastRequest {
            reference_time,
            latitude: asset.latitude,
            longitude: asset.longitude,
            rated_capacity: asset.rated_capacity_kw,
            alignment: asset.alignment_deg,
            slope: asset.slope_deg,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: response.status().as_u16(),
            });
        }

        let dto: SolarForecastResponse =
            response.json().await.map_err(|e| ProviderError::Payload {
                provider: PROVIDER,
                detail: e.to_string(),
            })?;

        Ok(dto.values.into_iter().map(|v| v.value).collect())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolarForecastRequest {
    reference_time: DateTime<FixedOffset>,
    latitude: f64,
    longitude: f64,
    rated_capacity: f64,
    alignment: f64,
    slope: f64,
}

#[derive(Debug, Deserialize)]
struct SolarForecastResponse {
    values: Vec<SolarForecastValue>,
}

#[derive(Debug, Deserialize)]
struct SolarForecastValue {
    value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn asset() -> SolarAsset {
        SolarAsset {
            id: "s-1".into(),
            latitude: 53.14,
            longitude: 8.21,
            rated_capacity_kw: 9.9,
            alignment_deg: 0.0,
            slope_deg: 30.0,
            capacity_percent: 70.0,
        }
    }

    #[tokio::test]
    async fn posts_asset_attributes_and_parses_series() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/forecast"))
            .and(body_partial_json(serde_json::json!({
                "latitude": 53.14,
                "ratedCapacity": 9.9,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [{"value": 0.0}, {"value": 3.2}, {"value": 5.1}],
            })))
            .mount(&server)
            .await;

        let reference = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();

        let client = SolarForecastClient::new(server.uri(), Duration::from_secs(5));
        let series = client.get_solar_forecast(reference, &asset()).await.unwrap();
        assert_eq!(series, vec![0.0, 3.2, 5.1]);
    }
}
