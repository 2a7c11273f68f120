use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use vpp_forecast::api::{self, AppState};
use vpp_forecast::config::Config;
use vpp_forecast::engine::ForecastEngine;
use vpp_forecast::providers::{SolarForecastClient, TopologyClient, WeatherClient};
use vpp_forecast::rendezvous::{Rendezvous, TracingCompletionSink};
use vpp_forecast::signals::{self, SignalBus};
use vpp_forecast::store::InMemoryForecastStore;
use vpp_forecast::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let timeout = cfg.providers.http_timeout();

    let topology = Arc::new(TopologyClient::new(cfg.providers.topology_base_url.clone(), timeout));
    let weather = Arc::new(WeatherClient::new(cfg.providers.weather_base_url.clone(), timeout));
    let solar = Arc::new(SolarForecastClient::new(
        cfg.providers.solar_base_url.clone(),
        timeout,
    ));
    let store = Arc::new(InMemoryForecastStore::new());

    let engine = Arc::new(ForecastEngine::new(
        topology,
        weather,
        solar,
        store.clone(),
        cfg.forecast.engine_config(),
    ));

    let rendezvous = Rendezvous::new(
        Arc::new(TracingCompletionSink),
        cfg.rendezvous.rendezvous_config(),
    );
    let (bus, rx) = SignalBus::channel();
    tokio::spawn(signals::run_dispatcher(rx, rendezvous));

    let state = AppState { engine, store, bus };
    let app = api::router(state);

    let addr = cfg.server.socket_addr()?;
    info!(%addr, "starting vpp production forecast service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}
