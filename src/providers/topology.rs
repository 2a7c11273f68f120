//! HTTP client for the master data (topology) service.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use async_trait::async_trait;

use crate::domain::{AssetInventory, OtherAsset, SolarAsset, WaterAsset, WindAsset};
use crate::error::ProviderError;
use crate::providers::TopologyProvider;

const PROVIDER: &str = "topology";

pub struct TopologyClient {
    client: Client,
    base_url: String,
}

impl TopologyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "querying topology service");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: response.status().as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Payload {
                provider: PROVIDER,
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl TopologyProvider for TopologyClient {
    async fn is_active_plant(&self, plant_id: &str) -> Result<bool, ProviderError> {
        let dto: PlantDto = self.get_json(&format!("/plant/{plant_id}")).await?;
        Ok(dto.published)
    }

    async fn list_households(&self, plant_id: &str) -> Result<Vec<String>, ProviderError> {
        let dtos: Vec<OwnerDto> = self.get_json(&format!("/plant/{plant_id}/households")).await?;
        Ok(dtos.into_iter().map(|d| d.id).collect())
    }

    async fn list_decentralized_plants(
        &self,
        plant_id: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let dtos: Vec<OwnerDto> = self.get_json(&format!("/plant/{plant_id}/dpps")).await?;
        Ok(dtos.into_iter().map(|d| d.id).collect())
    }

    async fn list_assets(&self, owner_id: &str) -> Result<AssetInventory, ProviderError> {
        let winds: Vec<WindDto> = self.get_json(&format!("/owner/{owner_id}/winds")).await?;
        let waters: Vec<WaterDto> = self.get_json(&format!("/owner/{owner_id}/waters")).await?;
        let solars: Vec<SolarDto> = self.get_json(&format!("/owner/{owner_id}/solars")).await?;
        let others: Vec<OtherDto> = self.get_json(&format!("/owner/{owner_id}/others")).await?;

        Ok(AssetInventory {
            winds: winds.into_iter().map(WindDto::into_domain).collect(),
            waters: waters.into_iter().map(WaterDto::into_domain).collect(),
            solars: solars.into_iter().map(SolarDto::into_domain).collect(),
            others: others.into_iter().map(OtherDto::into_domain).collect(),
        })
    }
}

// Wire format of the master data service.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlantDto {
    #[allow(dead_code)]
    virtual_power_plant_id: String,
    published: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerDto {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindDto {
    wind_energy_id: String,
    latitude: f64,
    longitude: f64,
    radius: f64,
    efficiency: f64,
    capacity: f64,
}

impl WindDto {
    fn into_domain(self) -> WindAsset {
        WindAsset {
            id: self.wind_energy_id,
            latitude: self.latitude,
            longitude: self.longitude,
            radius_m: self.radius,
            efficiency_percent: self.efficiency,
            capacity_percent: self.capacity,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaterDto {
    water_energy_id: String,
    height: f64,
    gravity: f64,
    density: f64,
    efficiency: f64,
    capacity: f64,
    volume_flow: f64,
}

impl WaterDto {
    fn into_domain(self) -> WaterAsset {
        WaterAsset {
            id: self.water_energy_id,
            height_m: self.height,
            gravity: self.gravity,
            density: self.density,
            efficiency_percent: self.efficiency,
            capacity_percent: self.capacity,
            volume_flow: self.volume_flow,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolarDto {
    solar_energy_id: String,
    latitude: f64,
    longitude: f64,
    rated_capacity: f64,
    alignment: f64,
    slope: f64,
    capacity: f64,
}

impl SolarDto {
    fn into_domain(self) -> SolarAsset {
        SolarAsset {
            id: self.solar_energy_id,
            latitude: self.latitude,
            longitude: self.longitude,
            rated_capacity_kw: self.rated_capacity,
            alignment_deg: self.alignment,
            slope_deg: self.slope,
            capacity_percent: self.capacity,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtherDto {
    other_energy_id: String,
    rated_capacity: f64,
    capacity: f64,
}

impl OtherDto {
    fn into_domain(self) -> OtherAsset {
        OtherAsset {
            id: self.other_energy_id,
            rated_capacity_kw: self.rated_capacity,
            capacity_percent: self.capacity,
        }
    }
}
