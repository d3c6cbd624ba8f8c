//! Metrics and alerting for the Axon gateway
//!
//! The dispatcher emits one record per terminal dispatch event into a
//! channel; a dedicated aggregator task folds records into rolling
//! windows and evaluates alert rules. The dispatcher is never blocked on
//! metrics processing.

#![allow(clippy::must_use_candidate, clippy::cast_precision_loss)]

pub mod alerts;
mod sampler;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use alerts::{Alert, AlertKind, AlertManager, AlertSeverity, AlertStatus, ThresholdUpdate};
pub use sampler::spawn_resource_sampler;
pub use state::{MetricsSnapshot, MetricsState, ProviderMetrics, RequestRecord, ResourceSample};

/// How often the aggregator task re-evaluates alert rules
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Event consumed by the aggregator task
#[derive(Debug)]
pub enum MetricsEvent {
    Request(RequestRecord),
    Resource(ResourceSample),
}

#[derive(Clone)]
enum HandleInner {
    /// Feed the aggregator task; sends never block
    Channel(mpsc::UnboundedSender<MetricsEvent>),
    /// Apply events synchronously, for embedded use and tests
    Inline(Arc<MetricsState>),
}

/// Cheap clonable handle writers use to emit metrics events
#[derive(Clone)]
pub struct MetricsHandle {
    inner: HandleInner,
}

impl MetricsHandle {
    /// Handle that applies events synchronously to the given state
    pub fn inline(state: Arc<MetricsState>) -> Self {
        Self {
            inner: HandleInner::Inline(state),
        }
    }

    pub fn record_request(&self, record: RequestRecord) {
        self.send(MetricsEvent::Request(record));
    }

    pub fn record_resource(&self, sample: ResourceSample) {
        self.send(MetricsEvent::Resource(sample));
    }

    fn send(&self, event: MetricsEvent) {
        match &self.inner {
            HandleInner::Channel(tx) => {
                if tx.send(event).is_err() {
                    tracing::debug!("metrics aggregator is gone, dropping event");
                }
            }
            HandleInner::Inline(state) => state.apply(event),
        }
    }
}

/// Spawn the aggregator task
///
/// Returns the handle writers emit into and the task's join handle. On
/// cancellation the task drains whatever is still queued before exiting.
pub fn spawn(
    state: Arc<MetricsState>,
    cancel: CancellationToken,
) -> (MetricsHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        let mut health_check = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => state.apply(event),
                    None => break,
                },
                _ = health_check.tick() => {
                    state.run_health_check();
                }
                () = cancel.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        state.apply(event);
                    }
                    tracing::debug!("metrics aggregator stopped");
                    break;
                }
            }
        }
    });

    (
        MetricsHandle {
            inner: HandleInner::Channel(tx),
        },
        task,
    )
}
