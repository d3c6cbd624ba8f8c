//! Rolling aggregation windows fed by dispatcher events

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use axon_config::AlertThresholds;
use axon_core::ErrorCode;
use dashmap::DashMap;
use serde::Serialize;

use crate::alerts::{AlertKind, AlertManager, AlertSeverity};
use crate::{Alert, MetricsEvent};

/// Request-rate window length
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Latency samples retained per provider
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Cost entries older than this are dropped on insert
const COST_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);

const DAY: Duration = Duration::from_secs(24 * 3600);

/// One record per terminal dispatch event
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub request_id: String,
    /// Provider that served (or last failed) the request; `unrouted`
    /// when no provider was ever chosen
    pub provider: String,
    pub success: bool,
    /// End-to-end dispatch latency
    pub latency_ms: f64,
    /// Time spent inside the adapter call, zero when none was made
    pub model_latency_ms: f64,
    pub cost: f64,
    pub tokens: u64,
    pub complexity: f64,
    pub failure_kind: Option<ErrorCode>,
}

/// Process-level resource usage sample
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceSample {
    /// CPU usage fraction in [0, 1]
    pub cpu_fraction: f64,
    pub process_rss_bytes: u64,
    pub system_memory_bytes: u64,
}

/// Per-provider rolling window
#[derive(Debug, Default)]
struct ProviderWindow {
    count: u64,
    error_count: u64,
    latency_sum: f64,
    latencies: VecDeque<f64>,
    costs: VecDeque<CostEntry>,
}

#[derive(Debug, Clone, Copy)]
struct CostEntry {
    at: SystemTime,
    cost: f64,
    tokens: u64,
}

impl ProviderWindow {
    fn record(&mut self, record: &RequestRecord) {
        self.count += 1;
        if !record.success {
            self.error_count += 1;
        }

        self.latency_sum += record.latency_ms;
        if self.latencies.len() >= MAX_LATENCY_SAMPLES {
            self.latencies.pop_front();
        }
        self.latencies.push_back(record.latency_ms);

        let now = SystemTime::now();
        self.costs.push_back(CostEntry {
            at: now,
            cost: record.cost,
            tokens: record.tokens,
        });
        while let Some(front) = self.costs.front() {
            let expired = now
                .duration_since(front.at)
                .map_or(false, |age| age > COST_RETENTION);
            if expired {
                self.costs.pop_front();
            } else {
                break;
            }
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.latency_sum / self.count as f64
        }
    }

    fn error_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.count as f64
        }
    }

    fn cost_since(&self, cutoff: SystemTime) -> f64 {
        self.costs
            .iter()
            .filter(|entry| entry.at >= cutoff)
            .map(|entry| entry.cost)
            .sum()
    }
}

/// Aggregated metrics over all providers
///
/// Writes are frequent and take per-provider locks; readers snapshot
/// under short locks. Window truncation runs opportunistically on write.
pub struct MetricsState {
    started: Instant,
    request_times: Mutex<VecDeque<Instant>>,
    providers: DashMap<String, Mutex<ProviderWindow>>,
    last_resource: Mutex<Option<ResourceSample>>,
    alerts: AlertManager,
}

impl MetricsState {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            started: Instant::now(),
            request_times: Mutex::new(VecDeque::new()),
            providers: DashMap::new(),
            last_resource: Mutex::new(None),
            alerts: AlertManager::new(thresholds),
        }
    }

    /// Alert state, owned by this aggregator
    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub(crate) fn apply(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::Request(record) => self.record_request(&record),
            MetricsEvent::Resource(sample) => self.record_resource(sample),
        }
    }

    /// Fold one dispatch record into the windows
    pub fn record_request(&self, record: &RequestRecord) {
        let now = Instant::now();
        {
            let mut times = self
                .request_times
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            times.push_back(now);
            while times
                .front()
                .is_some_and(|t| now.duration_since(*t) > RATE_WINDOW)
            {
                times.pop_front();
            }
        }

        let entry = self
            .providers
            .entry(record.provider.clone())
            .or_default();
        entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(record);
    }

    /// Store the latest resource sample
    pub fn record_resource(&self, sample: ResourceSample) {
        *self
            .last_resource
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sample);
    }

    /// Evaluate every alert rule against the current windows
    ///
    /// Raises breached alerts (idempotently while active) and resolves
    /// the ones whose condition has cleared. Returns the active set.
    pub fn run_health_check(&self) -> Vec<Alert> {
        let thresholds = self.alerts.thresholds();

        self.check_error_rate(&thresholds);
        self.check_latency(&thresholds);
        self.check_resources(&thresholds);
        self.check_costs(&thresholds);

        self.alerts.active()
    }

    fn check_error_rate(&self, thresholds: &AlertThresholds) {
        let worst = self.fold_providers(|name, window| {
            (window.count > 0).then(|| (name.to_string(), window.error_rate()))
        });

        match worst {
            Some((provider, rate)) if rate > thresholds.error_rate => {
                self.alerts.raise(
                    AlertKind::ErrorRate,
                    AlertSeverity::High,
                    format!("provider '{provider}' error rate {rate:.2} over threshold"),
                    serde_json::json!({"provider": provider, "error_rate": rate}),
                );
            }
            _ => self.alerts.resolve(AlertKind::ErrorRate),
        }
    }

    fn check_latency(&self, thresholds: &AlertThresholds) {
        let worst = self.fold_providers(|name, window| {
            (window.count > 0).then(|| (name.to_string(), window.avg_latency_ms()))
        });

        match worst {
            Some((provider, avg)) if avg > thresholds.avg_latency_ms => {
                self.alerts.raise(
                    AlertKind::Latency,
                    AlertSeverity::Medium,
                    format!("provider '{provider}' average latency {avg:.0}ms over threshold"),
                    serde_json::json!({"provider": provider, "avg_latency_ms": avg}),
                );
            }
            _ => self.alerts.resolve(AlertKind::Latency),
        }
    }

    fn check_resources(&self, thresholds: &AlertThresholds) {
        let sample = *self
            .last_resource
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(sample) = sample else { return };

        let memory_fraction = if sample.system_memory_bytes == 0 {
            0.0
        } else {
            sample.process_rss_bytes as f64 / sample.system_memory_bytes as f64
        };

        if memory_fraction > thresholds.memory_fraction {
            self.alerts.raise(
                AlertKind::Memory,
                AlertSeverity::High,
                format!("process memory at {:.0}% of system", memory_fraction * 100.0),
                serde_json::json!({"memory_fraction": memory_fraction}),
            );
        } else {
            self.alerts.resolve(AlertKind::Memory);
        }

        if sample.cpu_fraction > thresholds.cpu_fraction {
            self.alerts.raise(
                AlertKind::Cpu,
                AlertSeverity::Medium,
                format!("cpu at {:.0}%", sample.cpu_fraction * 100.0),
                serde_json::json!({"cpu_fraction": sample.cpu_fraction}),
            );
        } else {
            self.alerts.resolve(AlertKind::Cpu);
        }
    }

    fn check_costs(&self, thresholds: &AlertThresholds) {
        let now = SystemTime::now();
        let daily: f64 = self.sum_costs(now.checked_sub(DAY).unwrap_or(now));
        let monthly: f64 = self.sum_costs(now.checked_sub(COST_RETENTION).unwrap_or(now));

        if daily > thresholds.cost_daily {
            self.alerts.raise(
                AlertKind::CostDaily,
                AlertSeverity::High,
                format!("daily spend ${daily:.2} over threshold"),
                serde_json::json!({"daily_cost": daily}),
            );
        } else {
            self.alerts.resolve(AlertKind::CostDaily);
        }

        if monthly > thresholds.cost_monthly {
            self.alerts.raise(
                AlertKind::CostMonthly,
                AlertSeverity::Critical,
                format!("monthly spend ${monthly:.2} over threshold"),
                serde_json::json!({"monthly_cost": monthly}),
            );
        } else {
            self.alerts.resolve(AlertKind::CostMonthly);
        }
    }

    fn sum_costs(&self, cutoff: SystemTime) -> f64 {
        self.providers
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .cost_since(cutoff)
            })
            .sum()
    }

    /// Largest value of `f` across providers, by the second tuple field
    fn fold_providers<F>(&self, f: F) -> Option<(String, f64)>
    where
        F: Fn(&str, &ProviderWindow) -> Option<(String, f64)>,
    {
        self.providers
            .iter()
            .filter_map(|entry| {
                let window = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
                f(entry.key(), &window)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Point-in-time snapshot for operator endpoints
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = Instant::now();
        let requests_last_minute = {
            let times = self
                .request_times
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            times
                .iter()
                .filter(|t| now.duration_since(**t) <= RATE_WINDOW)
                .count()
        };

        let day_ago = SystemTime::now().checked_sub(DAY).unwrap_or_else(SystemTime::now);
        let mut providers: Vec<ProviderMetrics> = self
            .providers
            .iter()
            .map(|entry| {
                let window = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
                ProviderMetrics {
                    name: entry.key().clone(),
                    count: window.count,
                    error_count: window.error_count,
                    error_rate: window.error_rate(),
                    avg_latency_ms: window.avg_latency_ms(),
                    cost_last_day: window.cost_since(day_ago),
                    tokens_window: window.costs.iter().map(|e| e.tokens).sum(),
                }
            })
            .collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));

        MetricsSnapshot {
            uptime_seconds: self.started.elapsed().as_secs(),
            requests_last_minute,
            providers,
            resource: *self
                .last_resource
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            alerts: self.alerts.all(),
        }
    }
}

/// Serializable snapshot of the aggregator
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub requests_last_minute: usize,
    pub providers: Vec<ProviderMetrics>,
    pub resource: Option<ResourceSample>,
    pub alerts: Vec<Alert>,
}

/// Per-provider aggregates exposed in snapshots
#[derive(Debug, Serialize)]
pub struct ProviderMetrics {
    pub name: String,
    pub count: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub cost_last_day: f64,
    pub tokens_window: u64,
}
