use thiserror::Error;

/// Errors that can abort a forecast run.
///
/// A failed run is never retried automatically; the caller converts the
/// error into an explicit-failure signal for the affected request id.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("plant {0} is not active")]
    InactivePlant(String),

    #[error("invalid asset attribute: {0}")]
    Validation(String),

    #[error("external provider unavailable: {0}")]
    ExternalUnavailable(#[from] ProviderError),

    #[error("forecast store rejected the run: {0}")]
    Persistence(#[from] crate::store::StoreError),
}

/// Failures of the external collaborators (topology, weather, solar).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}")]
    Status {
        provider: &'static str,
        status: u16,
    },

    #[error("{provider} returned an unusable payload: {detail}")]
    Payload {
        provider: &'static str,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_error_display() {
        let err = ForecastError::InactivePlant("vpp-1".into());
        assert_eq!(err.to_string(), "plant vpp-1 is not active");

        let err = ForecastError::Validation("negative radius".into());
        assert_eq!(err.to_string(), "invalid asset attribute: negative radius");
    }

    #[test]
    fn provider_error_wraps_into_forecast_error() {
        let err: ForecastError = ProviderError::Status {
            provider: "weather",
            status: 503,
        }
        .into();
        assert!(matches!(err, ForecastError::ExternalUnavailable(_)));
        assert_eq!(
            err.to_string(),
            "external provider unavailable: weather returned status 503"
        );
    }
}
