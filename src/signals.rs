//! Signal channel between the forecast engine and the rendezvous.
//!
//! The engine and the rendezvous never block on each other; they only
//! communicate through one-directional signals carried by this bus. In the
//! deployed system the channel is a message broker; in-process the bus is a
//! tokio mpsc pair with the same envelope shapes.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::rendezvous::{Rendezvous, SignalSource};

/// Completion signal emitted on the production-ready channel after a
/// successful forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSignal {
    pub request_id: String,
    /// First timestamp after the computed horizon.
    pub final_timestamp: DateTime<FixedOffset>,
}

/// Inbound signal envelopes consumed by the rendezvous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum InboundSignal {
    #[serde(rename_all = "camelCase")]
    DemandReady {
        request_id: String,
        timestamp: DateTime<FixedOffset>,
    },
    #[serde(rename_all = "camelCase")]
    ProductionReady {
        request_id: String,
        timestamp: DateTime<FixedOffset>,
    },
    #[serde(rename_all = "camelCase")]
    Failed { request_id: String },
}

/// Outbound edge used by the engine's caller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionPublisher: Send + Sync {
    async fn production_ready(&self, signal: CompletionSignal);
    async fn failed(&self, request_id: &str);
}

/// In-process signal bus. Cloneable sender half.
#[derive(Clone)]
pub struct SignalBus {
    tx: mpsc::UnboundedSender<InboundSignal>,
}

impl SignalBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InboundSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, signal: InboundSignal) {
        if self.tx.send(signal).is_err() {
            warn!("signal dispatcher is gone, dropping signal");
        }
    }
}

#[async_trait]
impl CompletionPublisher for SignalBus {
    async fn production_ready(&self, signal: CompletionSignal) {
        self.send(InboundSignal::ProductionReady {
            request_id: signal.request_id,
            timestamp: signal.final_timestamp,
        });
    }

    async fn failed(&self, request_id: &str) {
        self.send(InboundSignal::Failed {
            request_id: request_id.to_string(),
        });
    }
}

/// Consumes the bus and feeds the rendezvous. Runs until the last sender
/// is dropped.
pub async fn run_dispatcher(
    mut rx: mpsc::UnboundedReceiver<InboundSignal>,
    rendezvous: Rendezvous,
) {
    while let Some(signal) = rx.recv().await {
        debug!(?signal, "dispatching inbound signal");
        match signal {
            InboundSignal::DemandReady { request_id, .. } => {
                rendezvous.signal(SignalSource::Demand, &request_id);
            }
            InboundSignal::ProductionReady { request_id, .. } => {
                rendezvous.signal(SignalSource::Production, &request_id);
            }
            InboundSignal::Failed { request_id } => {
                rendezvous.explicit_failure(&request_id);
            }
        }
    }
    debug!("signal bus closed, dispatcher stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendezvous::{MockCompletionSink, RendezvousConfig};
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn inbound_signal_wire_format() {
        let json = serde_json::to_value(InboundSignal::DemandReady {
            request_id: "req-1".into(),
            timestamp: ts(),
        })
        .unwrap();
        assert_eq!(json["kind"], "demandReady");
        assert_eq!(json["requestId"], "req-1");

        let parsed: InboundSignal =
            serde_json::from_str(r#"{"kind":"failed","requestId":"req-2"}"#).unwrap();
        assert_eq!(
            parsed,
            InboundSignal::Failed {
                request_id: "req-2".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dispatcher_routes_signals_to_the_rendezvous() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_aggregation_ready()
            .withf(|id| id == "req-1")
            .times(1)
            .returning(|_| ());
        sink.expect_on_failed()
            .withf(|id| id == "req-2")
            .times(1)
            .returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), RendezvousConfig::default());
        let (bus, rx) = SignalBus::channel();
        tokio::spawn(run_dispatcher(rx, rendezvous.clone()));

        bus.send(InboundSignal::DemandReady {
            request_id: "req-1".into(),
            timestamp: ts(),
        });
        bus.production_ready(CompletionSignal {
            request_id: "req-1".into(),
            final_timestamp: ts(),
        })
        .await;
        bus.failed("req-2").await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(rendezvous.pending_count(), 0);
    }
}
