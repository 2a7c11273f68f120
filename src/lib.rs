pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod power;
pub mod providers;
pub mod rendezvous;
pub mod signals;
pub mod store;
pub mod telemetry;
