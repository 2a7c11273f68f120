use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::ForecastError;

/// Closed set of producer source types.
///
/// The wire format uses the upper-case tags; anything outside this set is
/// rejected at deserialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SourceType {
    Wind,
    Water,
    Solar,
    Other,
}

/// One 15-minute slot within a forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningPeriod {
    /// Sequence index within the run (0..=96).
    pub index: usize,
    pub start: DateTime<FixedOffset>,
}

/// Forecasted output of a single asset for a single planning period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerForecastRecord {
    pub asset_id: String,
    pub source_type: SourceType,
    /// Potential scaled by the asset's operating percentage (kW).
    pub instantaneous_kw: f64,
    /// Theoretical maximum output under current conditions (kW).
    pub potential_kw: f64,
    pub period_start: DateTime<FixedOffset>,
    pub run_id: String,
}

impl ProducerForecastRecord {
    /// Build a record, enforcing `0 <= instantaneous <= potential`.
    pub fn new(
        asset_id: impl Into<String>,
        source_type: SourceType,
        instantaneous_kw: f64,
        potential_kw: f64,
        period_start: DateTime<FixedOffset>,
        run_id: impl Into<String>,
    ) -> Result<Self, ForecastError> {
        if !instantaneous_kw.is_finite() || !potential_kw.is_finite() {
            return Err(ForecastError::Validation(format!(
                "non-finite output values ({instantaneous_kw}, {potential_kw})"
            )));
        }
        if instantaneous_kw < 0.0 || instantaneous_kw > potential_kw {
            return Err(ForecastError::Validation(format!(
                "instantaneous {instantaneous_kw} kW outside [0, {potential_kw}]"
            )));
        }
        Ok(Self {
            asset_id: asset_id.into(),
            source_type,
            instantaneous_kw,
            potential_kw,
            period_start,
            run_id: run_id.into(),
        })
    }
}

/// One complete horizon computation for a plant, tied to a single request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRun {
    pub request_id: String,
    pub plant_id: String,
    pub created_at: DateTime<FixedOffset>,
    pub periods: Vec<PlanningPeriod>,
    pub records: Vec<ProducerForecastRecord>,
}

impl ForecastRun {
    pub fn new(
        request_id: impl Into<String>,
        plant_id: impl Into<String>,
        created_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            plant_id: plant_id.into(),
            created_at,
            periods: Vec::new(),
            records: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn source_type_display_and_serde() {
        assert_eq!(SourceType::Wind.to_string(), "WIND");
        assert_eq!(
            serde_json::to_string(&SourceType::Solar).unwrap(),
            "\"SOLAR\""
        );
        let parsed: SourceType = serde_json::from_str("\"WATER\"").unwrap();
        assert_eq!(parsed, SourceType::Water);
        assert!(serde_json::from_str::<SourceType>("\"NUCLEAR\"").is_err());
    }

    #[test]
    fn record_accepts_valid_range() {
        let rec =
            ProducerForecastRecord::new("w-1", SourceType::Wind, 40.0, 80.0, t0(), "run-1").unwrap();
        assert_eq!(rec.instantaneous_kw, 40.0);
        assert_eq!(rec.potential_kw, 80.0);
    }

    #[test]
    fn record_rejects_negative_and_exceeding_values() {
        assert!(
            ProducerForecastRecord::new("w-1", SourceType::Wind, -1.0, 80.0, t0(), "run-1")
                .is_err()
        );
        assert!(
            ProducerForecastRecord::new("w-1", SourceType::Wind, 81.0, 80.0, t0(), "run-1")
                .is_err()
        );
        assert!(ProducerForecastRecord::new(
            "w-1",
            SourceType::Wind,
            f64::NAN,
            80.0,
            t0(),
            "run-1"
        )
        .is_err());
    }
}
