//! Forecast run persistence.
//!
//! The actual storage backend lives in another service; the engine only
//! needs a sink it can stream runs into. The in-memory implementation backs
//! the service locally and the tests.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::{ForecastRun, PlanningPeriod, ProducerForecastRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown forecast run {0}")]
    UnknownRun(String),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Register a new run before any periods or records are written.
    async fn create_run(&self, run: &ForecastRun) -> Result<(), StoreError>;

    async fn append_period(
        &self,
        request_id: &str,
        period: PlanningPeriod,
    ) -> Result<(), StoreError>;

    async fn append_record(
        &self,
        request_id: &str,
        record: ProducerForecastRecord,
    ) -> Result<(), StoreError>;

    async fn get_run(&self, request_id: &str) -> Result<Option<ForecastRun>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryForecastStore {
    runs: RwLock<HashMap<String, ForecastRun>>,
}

impl InMemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ForecastStore for InMemoryForecastStore {
    async fn create_run(&self, run: &ForecastRun) -> Result<(), StoreError> {
        self.runs
            .write()
            .insert(run.request_id.clone(), run.clone());
        Ok(())
    }

    async fn append_period(
        &self,
        request_id: &str,
        period: PlanningPeriod,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let run = runs
            .get_mut(request_id)
            .ok_or_else(|| StoreError::UnknownRun(request_id.to_string()))?;
        run.periods.push(period);
        Ok(())
    }

    async fn append_record(
        &self,
        request_id: &str,
        record: ProducerForecastRecord,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let run = runs
            .get_mut(request_id)
            .ok_or_else(|| StoreError::UnknownRun(request_id.to_string()))?;
        run.records.push(record);
        Ok(())
    }

    async fn get_run(&self, request_id: &str) -> Result<Option<ForecastRun>, StoreError> {
        Ok(self.runs.read().get(request_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceType;
    use chrono::{FixedOffset, TimeZone};

    #[tokio::test]
    async fn streams_periods_and_records_into_a_run() {
        let store = InMemoryForecastStore::new();
        let start = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();

        let run = ForecastRun::new("req-1", "vpp-1", start);
        store.create_run(&run).await.unwrap();

        store
            .append_period("req-1", PlanningPeriod { index: 0, start })
            .await
            .unwrap();
        let record =
            ProducerForecastRecord::new("o-1", SourceType::Other, 5.0, 10.0, start, "req-1")
                .unwrap();
        store.append_record("req-1", record).await.unwrap();

        let stored = store.get_run("req-1").await.unwrap().unwrap();
        assert_eq!(stored.periods.len(), 1);
        assert_eq!(stored.records.len(), 1);
    }

    #[tokio::test]
    async fn rejects_appends_to_unknown_run() {
        let store = InMemoryForecastStore::new();
        let start = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();
        let err = store
            .append_period("nope", PlanningPeriod { index: 0, start })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownRun(_)));
    }
}
