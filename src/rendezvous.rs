//! Completion rendezvous.
//!
//! Synchronizes the two independently produced completion signals
//! (demand-forecast-ready, production-forecast-ready) for a request id
//! before releasing the downstream aggregation step.
//!
//! Per request id the protocol is a small state machine:
//!
//! `WAITING_NONE -> WAITING_ONE -> {SATISFIED | TIMED_OUT | OVERFLOWED}`
//!
//! All three end states are terminal; the registry entry is removed on
//! reaching any of them. An explicit upstream failure short-circuits the
//! counting protocol entirely.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which side produced a completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    Demand,
    Production,
}

/// Terminal outcome of the rendezvous for one request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Satisfied,
    TimedOut,
    Overflowed,
    Failed,
}

/// Downstream triggers released by the rendezvous.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn on_aggregation_ready(&self, request_id: &str);
    async fn on_failed(&self, request_id: &str);
}

#[derive(Debug, Clone)]
pub struct RendezvousConfig {
    /// How long a lone first signal may wait for its counterpart.
    pub deadline: Duration,
    /// How long a terminal resolution marker is kept so that late signals
    /// can be classified instead of opening a fresh entry.
    pub resolution_retention: Duration,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5 * 60),
            resolution_retention: Duration::from_secs(10 * 60),
        }
    }
}

enum EntryState {
    /// One signal arrived; the deadline timer is running.
    WaitingOne {
        first: SignalSource,
        timer: JoinHandle<()>,
    },
    /// Both signals arrived; the aggregation dispatch task re-checks this
    /// state before firing, so a third arrival can still overflow.
    Satisfied,
}

struct Registry {
    entries: HashMap<String, EntryState>,
    resolved: HashMap<String, Resolution>,
}

struct Inner {
    registry: Mutex<Registry>,
    sink: Arc<dyn CompletionSink>,
    config: RendezvousConfig,
}

/// Shared handle to the rendezvous registry. Cheap to clone.
#[derive(Clone)]
pub struct Rendezvous {
    inner: Arc<Inner>,
}

impl Rendezvous {
    pub fn new(sink: Arc<dyn CompletionSink>, config: RendezvousConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry {
                    entries: HashMap::new(),
                    resolved: HashMap::new(),
                }),
                sink,
                config,
            }),
        }
    }

    /// Handle a completion signal from one of the two sources.
    ///
    /// The whole read-modify-write over the registry is one critical
    /// section; sink invocations run outside the lock.
    pub fn signal(&self, source: SignalSource, request_id: &str) {
        let mut registry = self.inner.registry.lock();

        if let Some(resolution) = registry.resolved.get(request_id).copied() {
            match resolution {
                Resolution::Failed | Resolution::Overflowed => {
                    debug!(%request_id, ?source, ?resolution, "signal after terminal resolution, ignoring");
                }
                Resolution::Satisfied | Resolution::TimedOut => {
                    warn!(%request_id, ?source, "signal after resolution, overflowing");
                    registry
                        .resolved
                        .insert(request_id.to_string(), Resolution::Overflowed);
                    drop(registry);
                    self.dispatch_failure(request_id.to_string());
                    self.schedule_prune(request_id.to_string());
                }
            }
            return;
        }

        match registry.entries.remove(request_id) {
            None => {
                info!(%request_id, ?source, "first signal, waiting for counterpart");
                let timer = self.spawn_deadline_timer(request_id.to_string());
                registry.entries.insert(
                    request_id.to_string(),
                    EntryState::WaitingOne {
                        first: source,
                        timer,
                    },
                );
            }
            Some(EntryState::WaitingOne { first, timer }) if first != source => {
                info!(%request_id, ?source, "second signal, rendezvous satisfied");
                timer.abort();
                registry
                    .entries
                    .insert(request_id.to_string(), EntryState::Satisfied);
                drop(registry);
                self.spawn_aggregation_dispatch(request_id.to_string());
            }
            Some(EntryState::WaitingOne { timer, .. }) => {
                warn!(%request_id, ?source, "duplicate signal from the same source, overflowing");
                timer.abort();
                registry
                    .resolved
                    .insert(request_id.to_string(), Resolution::Overflowed);
                drop(registry);
                self.dispatch_failure(request_id.to_string());
                self.schedule_prune(request_id.to_string());
            }
            Some(EntryState::Satisfied) => {
                warn!(%request_id, ?source, "third signal before resolution, overflowing");
                registry
                    .resolved
                    .insert(request_id.to_string(), Resolution::Overflowed);
                drop(registry);
                self.dispatch_failure(request_id.to_string());
                self.schedule_prune(request_id.to_string());
            }
        }
    }

    /// Explicit upstream failure: bypasses the counting protocol and the
    /// deadline, fails the request immediately.
    pub fn explicit_failure(&self, request_id: &str) {
        let mut registry = self.inner.registry.lock();

        if registry.resolved.get(request_id) == Some(&Resolution::Failed) {
            debug!(%request_id, "repeated explicit failure, ignoring");
            return;
        }

        if let Some(EntryState::WaitingOne { timer, .. }) = registry.entries.remove(request_id) {
            timer.abort();
        }
        registry
            .resolved
            .insert(request_id.to_string(), Resolution::Failed);
        drop(registry);

        info!(%request_id, "explicit upstream failure, failing request");
        self.dispatch_failure(request_id.to_string());
        self.schedule_prune(request_id.to_string());
    }

    /// Whether an unresolved entry currently exists for the id.
    pub fn is_pending(&self, request_id: &str) -> bool {
        self.inner.registry.lock().entries.contains_key(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.registry.lock().entries.len()
    }

    fn spawn_deadline_timer(&self, request_id: String) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.config.deadline).await;

            // The entry may have resolved while we slept.
            let timed_out = {
                let mut registry = this.inner.registry.lock();
                match registry.entries.get(&request_id) {
                    Some(EntryState::WaitingOne { .. }) => {
                        registry.entries.remove(&request_id);
                        registry
                            .resolved
                            .insert(request_id.clone(), Resolution::TimedOut);
                        true
                    }
                    _ => false,
                }
            };

            if timed_out {
                warn!(%request_id, "no counterpart signal before the deadline, failing request");
                this.inner.sink.on_failed(&request_id).await;
                this.schedule_prune(request_id);
            }
        })
    }

    /// Resolution of a satisfied entry happens here: the entry is removed
    /// and the aggregation trigger fired, unless a third signal overflowed
    /// the entry in the meantime.
    fn spawn_aggregation_dispatch(&self, request_id: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let fire = {
                let mut registry = this.inner.registry.lock();
                match registry.entries.get(&request_id) {
                    Some(EntryState::Satisfied) => {
                        registry.entries.remove(&request_id);
                        registry
                            .resolved
                            .insert(request_id.clone(), Resolution::Satisfied);
                        true
                    }
                    _ => false,
                }
            };

            if fire {
                info!(%request_id, "releasing downstream aggregation");
                this.inner.sink.on_aggregation_ready(&request_id).await;
                this.schedule_prune(request_id);
            }
        });
    }

    fn dispatch_failure(&self, request_id: String) {
        let sink = self.inner.sink.clone();
        tokio::spawn(async move {
            sink.on_failed(&request_id).await;
        });
    }

    /// Resolution markers are pruned after a retention window so memory
    /// stays bounded across many request ids.
    fn schedule_prune(&self, request_id: String) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.resolution_retention).await;
            inner.registry.lock().resolved.remove(&request_id);
        });
    }
}

/// Sink for deployments where the aggregation step is triggered out of
/// band; records every outcome in the log.
pub struct TracingCompletionSink;

#[async_trait]
impl CompletionSink for TracingCompletionSink {
    async fn on_aggregation_ready(&self, request_id: &str) {
        info!(%request_id, "both forecasts ready, aggregation released");
    }

    async fn on_failed(&self, request_id: &str) {
        warn!(%request_id, "request marked failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RendezvousConfig {
        RendezvousConfig {
            deadline: Duration::from_secs(5 * 60),
            resolution_retention: Duration::from_secs(10 * 60),
        }
    }

    fn settle() -> tokio::time::Sleep {
        // Paused-clock tests: lets spawned dispatch/timer tasks run.
        tokio::time::sleep(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn both_signals_release_aggregation_exactly_once() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_aggregation_ready()
            .withf(|id| id == "req-1")
            .times(1)
            .returning(|_| ());
        // No on_failed expectation: any failure call panics the test.

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-1");
        rendezvous.signal(SignalSource::Production, "req-1");
        settle().await;

        assert!(!rendezvous.is_pending("req-1"));
        assert_eq!(rendezvous.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn signal_order_does_not_matter() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_aggregation_ready().times(1).returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Production, "req-2");
        rendezvous.signal(SignalSource::Demand, "req-2");
        settle().await;

        assert!(!rendezvous.is_pending("req-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn lone_signal_times_out_and_fails() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_failed()
            .withf(|id| id == "req-3")
            .times(1)
            .returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-3");
        assert!(rendezvous.is_pending("req-3"));

        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        assert!(!rendezvous.is_pending("req-3"));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_is_a_noop_after_resolution() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_aggregation_ready().times(1).returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-4");
        rendezvous.signal(SignalSource::Production, "req-4");
        settle().await;

        // Advancing past the deadline must not produce a failure.
        tokio::time::sleep(Duration::from_secs(6 * 60)).await;
        assert!(!rendezvous.is_pending("req-4"));
    }

    #[tokio::test(start_paused = true)]
    async fn triple_signal_in_quick_succession_overflows() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_failed()
            .withf(|id| id == "req-5")
            .times(1)
            .returning(|_| ());
        // Aggregation must never fire: no expectation set.

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-5");
        rendezvous.signal(SignalSource::Production, "req-5");
        rendezvous.signal(SignalSource::Demand, "req-5");
        settle().await;

        assert!(!rendezvous.is_pending("req-5"));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_same_source_signal_overflows() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_failed().times(1).returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-6");
        rendezvous.signal(SignalSource::Demand, "req-6");
        settle().await;

        assert!(!rendezvous.is_pending("req-6"));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_failure_short_circuits_and_later_signals_are_noops() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_failed()
            .withf(|id| id == "req-7")
            .times(1)
            .returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.explicit_failure("req-7");
        settle().await;

        rendezvous.signal(SignalSource::Demand, "req-7");
        rendezvous.signal(SignalSource::Production, "req-7");
        settle().await;

        assert!(!rendezvous.is_pending("req-7"));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_failure_during_waiting_cancels_the_entry() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_failed().times(1).returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-8");
        rendezvous.explicit_failure("req-8");
        settle().await;

        assert!(!rendezvous.is_pending("req-8"));

        // The aborted deadline timer must not fire a second failure.
        tokio::time::sleep(Duration::from_secs(6 * 60)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn late_signal_after_satisfaction_overflows_once() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_aggregation_ready().times(1).returning(|_| ());
        sink.expect_on_failed()
            .withf(|id| id == "req-9")
            .times(1)
            .returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-9");
        rendezvous.signal(SignalSource::Production, "req-9");
        settle().await;

        // Resolved: the straggler overflows, anything after that is ignored.
        rendezvous.signal(SignalSource::Demand, "req-9");
        settle().await;
        rendezvous.signal(SignalSource::Production, "req-9");
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_markers_are_pruned_after_retention() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_aggregation_ready().times(1).returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-10");
        rendezvous.signal(SignalSource::Production, "req-10");
        settle().await;

        tokio::time::sleep(Duration::from_secs(11 * 60)).await;
        assert_eq!(rendezvous.inner.registry.lock().resolved.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_request_ids_do_not_interfere() {
        let mut sink = MockCompletionSink::new();
        sink.expect_on_aggregation_ready()
            .withf(|id| id == "req-a")
            .times(1)
            .returning(|_| ());
        sink.expect_on_failed()
            .withf(|id| id == "req-b")
            .times(1)
            .returning(|_| ());

        let rendezvous = Rendezvous::new(Arc::new(sink), test_config());
        rendezvous.signal(SignalSource::Demand, "req-a");
        rendezvous.signal(SignalSource::Demand, "req-b");
        rendezvous.signal(SignalSource::Production, "req-a");
        settle().await;

        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(rendezvous.pending_count(), 0);
    }
}
