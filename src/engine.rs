//! Forecast engine.
//!
//! Orchestrates one forecast run for a plant: checks the plant is active,
//! walks the 97 planning periods of the rolling horizon, computes potential
//! and instantaneous output for every asset through the producer output
//! model, streams the records into the store and finally emits the
//! completion signal on the production-ready channel.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{
    AssetInventory, ForecastRun, PlanningPeriod, ProducerForecastRecord, SourceType,
};
use crate::error::{ForecastError, ProviderError};
use crate::power;
use crate::providers::{SolarForecastProvider, TopologyProvider, WeatherProvider, WeatherSample};
use crate::signals::{CompletionPublisher, CompletionSignal};
use crate::store::ForecastStore;

/// 24 hours in 15-minute steps; the horizon spans one extra boundary
/// period, so a run covers indices `0..=FORECAST_PERIODS`.
pub const FORECAST_PERIODS: usize = 24 * 4;

const PERIOD_MINUTES: i64 = 15;

/// Engine settings.
///
/// `utc_offset_hours` pins "current time" to a fixed offset. This is
/// deliberately not DST-aware; the deployed system has always run on a
/// fixed UTC+2 clock and the behavior is preserved, not corrected.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub utc_offset_hours: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { utc_offset_hours: 2 }
    }
}

pub struct ForecastEngine {
    topology: Arc<dyn TopologyProvider>,
    weather: Arc<dyn WeatherProvider>,
    solar: Arc<dyn SolarForecastProvider>,
    store: Arc<dyn ForecastStore>,
    horizon_offset: FixedOffset,
}

impl ForecastEngine {
    pub fn new(
        topology: Arc<dyn TopologyProvider>,
        weather: Arc<dyn WeatherProvider>,
        solar: Arc<dyn SolarForecastProvider>,
        store: Arc<dyn ForecastStore>,
        config: EngineConfig,
    ) -> Self {
        let horizon_offset = FixedOffset::east_opt(config.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset"));
        Self {
            topology,
            weather,
            solar,
            store,
            horizon_offset,
        }
    }

    /// Compute one forecast run.
    ///
    /// Any provider or validation failure aborts the whole run; nothing is
    /// retried and no completion signal is emitted. The caller is expected
    /// to publish an explicit-failure signal in that case.
    pub async fn compute_forecast_run(
        &self,
        publisher: &dyn CompletionPublisher,
        request_id: &str,
        plant_id: &str,
    ) -> Result<ForecastRun, ForecastError> {
        if !self.topology.is_active_plant(plant_id).await? {
            return Err(ForecastError::InactivePlant(plant_id.to_string()));
        }

        let now = Utc::now().with_timezone(&self.horizon_offset);
        let horizon_start = floor_to_period(now);
        info!(%request_id, %plant_id, %horizon_start, "starting forecast run");

        let mut run = ForecastRun::new(request_id, plant_id, horizon_start);
        self.store.create_run(&run).await?;

        // Topology and asset attributes are resolved once per run; every
        // period observes the same inventory.
        let mut owners = self.topology.list_households(plant_id).await?;
        owners.extend(self.topology.list_decentralized_plants(plant_id).await?);

        let mut inventories: Vec<AssetInventory> = Vec::with_capacity(owners.len());
        for owner_id in &owners {
            inventories.push(self.topology.list_assets(owner_id).await?);
        }

        let (weather_cache, solar_cache) = self.prefetch_series(&inventories, now).await?;

        let mut period_start = horizon_start;
        for index in 0..=FORECAST_PERIODS {
            let period = PlanningPeriod {
                index,
                start: period_start,
            };
            self.store.append_period(request_id, period).await?;
            run.periods.push(period);

            for inventory in &inventories {
                self.compute_inventory_period(
                    &mut run,
                    inventory,
                    index,
                    period_start,
                    &weather_cache,
                    &solar_cache,
                )
                .await?;
            }

            period_start += Duration::minutes(PERIOD_MINUTES);
        }

        info!(
            %request_id,
            periods = run.periods.len(),
            records = run.records.len(),
            "forecast run complete, emitting completion signal"
        );
        publisher
            .production_ready(CompletionSignal {
                request_id: request_id.to_string(),
                final_timestamp: period_start,
            })
            .await;

        Ok(run)
    }

    /// Fetch the weather series of every wind asset and the horizon series
    /// of every solar asset, once per asset id.
    async fn prefetch_series(
        &self,
        inventories: &[AssetInventory],
        reference_time: DateTime<FixedOffset>,
    ) -> Result<(HashMap<String, Vec<WeatherSample>>, HashMap<String, Vec<f64>>), ForecastError>
    {
        let mut weather_cache: HashMap<String, Vec<WeatherSample>> = HashMap::new();
        let mut solar_cache: HashMap<String, Vec<f64>> = HashMap::new();

        for inventory in inventories {
            for wind in &inventory.winds {
                if !weather_cache.contains_key(&wind.id) {
                    let series = self.weather.get_weather(wind.latitude, wind.longitude).await?;
                    if series.is_empty() {
                        return Err(ProviderError::Payload {
                            provider: "weather",
                            detail: format!("empty weather series for asset {}", wind.id),
                        }
                        .into());
                    }
                    debug!(asset_id = %wind.id, samples = series.len(), "cached weather series");
                    weather_cache.insert(wind.id.clone(), series);
                }
            }
            for solar in &inventory.solars {
                if !solar_cache.contains_key(&solar.id) {
                    let series = self.solar.get_solar_forecast(reference_time, solar).await?;
                    if series.len() <= FORECAST_PERIODS {
                        return Err(ProviderError::Payload {
                            provider: "solar",
                            detail: format!(
                                "solar series for asset {} covers {} of {} periods",
                                solar.id,
                                series.len(),
                                FORECAST_PERIODS + 1
                            ),
                        }
                        .into());
                    }
                    debug!(asset_id = %solar.id, "cached solar forecast series");
                    solar_cache.insert(solar.id.clone(), series);
                }
            }
        }

        Ok((weather_cache, solar_cache))
    }

    async fn compute_inventory_period(
        &self,
        run: &mut ForecastRun,
        inventory: &AssetInventory,
        period_index: usize,
        period_start: DateTime<FixedOffset>,
        weather_cache: &HashMap<String, Vec<WeatherSample>>,
        solar_cache: &HashMap<String, Vec<f64>>,
    ) -> Result<(), ForecastError> {
        let run_id = run.request_id.clone();

        for wind in &inventory.winds {
            let series = &weather_cache[&wind.id];
            let sample = select_weather_sample(series, period_start)
                .expect("weather series verified non-empty at prefetch");
            let density = power::air_density(
                sample.air_pressure_hpa,
                sample.air_humidity_percent,
                sample.temperature_c,
            );
            let potential = power::wind_power(
                wind.radius_m,
                sample.wind_speed_ms,
                density,
                wind.efficiency_percent,
            );
            let instantaneous = potential * wind.efficiency_percent / 100.0;
            let record = ProducerForecastRecord::new(
                wind.id.as_str(),
                SourceType::Wind,
                instantaneous,
                potential,
                period_start,
                run_id.as_str(),
            )?;
            self.persist(run, record).await?;
        }

        for water in &inventory.waters {
            let potential = power::hydro_power(
                water.height_m,
                water.gravity,
                water.density,
                water.efficiency_percent,
                water.volume_flow,
            );
            let instantaneous = potential * water.capacity_percent / 100.0;
            let record = ProducerForecastRecord::new(
                water.id.as_str(),
                SourceType::Water,
                instantaneous,
                potential,
                period_start,
                run_id.as_str(),
            )?;
            self.persist(run, record).await?;
        }

        for solar in &inventory.solars {
            let potential = solar_cache[&solar.id][period_index];
            let instantaneous = potential * solar.capacity_percent / 100.0;
            let record = ProducerForecastRecord::new(
                solar.id.as_str(),
                SourceType::Solar,
                instantaneous,
                potential,
                period_start,
                run_id.as_str(),
            )?;
            self.persist(run, record).await?;
        }

        for other in &inventory.others {
            let potential = other.rated_capacity_kw;
            let instantaneous = potential * other.capacity_percent / 100.0;
            let record = ProducerForecastRecord::new(
                other.id.as_str(),
                SourceType::Other,
                instantaneous,
                potential,
                period_start,
                run_id.as_str(),
            )?;
            self.persist(run, record).await?;
        }

        Ok(())
    }

    async fn persist(
        &self,
        run: &mut ForecastRun,
        record: ProducerForecastRecord,
    ) -> Result<(), ForecastError> {
        self.store
            .append_record(&run.request_id, record.clone())
            .await?;
        run.records.push(record);
        Ok(())
    }
}

/// Truncate a timestamp to the nearest lower 15-minute boundary.
pub fn floor_to_period(t: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let floored_minute = t.minute() - t.minute() % 15;
    t.with_minute(floored_minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("floored minute is always valid")
}

/// Pick the sample whose (weekday, month, year, hour) matches the period
/// start exactly; otherwise fall back to the first sample of the series.
pub fn select_weather_sample<'a>(
    samples: &'a [WeatherSample],
    period_start: DateTime<FixedOffset>,
) -> Option<&'a WeatherSample> {
    samples
        .iter()
        .find(|s| {
            s.timestamp.weekday() == period_start.weekday()
                && s.timestamp.month() == period_start.month()
                && s.timestamp.year() == period_start.year()
                && s.timestamp.hour() == period_start.hour()
        })
        .or_else(|| samples.first())
}
