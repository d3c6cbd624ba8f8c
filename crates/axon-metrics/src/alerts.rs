//! Typed alerts with threshold-driven evaluation
//!
//! Alert state is owned exclusively by the aggregator. Alerts are
//! deduplicated by kind while active: a repeated breach refreshes the
//! existing alert instead of minting a new one.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axon_config::AlertThresholds;
use dashmap::DashMap;
use serde::Serialize;

/// Category of a raised alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ErrorRate,
    Latency,
    Memory,
    Cpu,
    CostDaily,
    CostMonthly,
}

impl AlertKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ErrorRate => "error_rate",
            Self::Latency => "latency",
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::CostDaily => "cost_daily",
            Self::CostMonthly => "cost_monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

/// A raised alert with its triggering data
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    /// Rule-specific measurements behind the breach
    pub data: serde_json::Value,
    /// Unix milliseconds when the alert was raised or last refreshed
    pub timestamp: u64,
    pub status: AlertStatus,
}

/// Partial threshold override, merged into the running thresholds
#[derive(Debug, Default, Clone)]
pub struct ThresholdUpdate {
    pub error_rate: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    pub memory_fraction: Option<f64>,
    pub cpu_fraction: Option<f64>,
    pub cost_daily: Option<f64>,
    pub cost_monthly: Option<f64>,
}

/// Owns alert state and the thresholds that drive evaluation
pub struct AlertManager {
    thresholds: Mutex<AlertThresholds>,
    alerts: DashMap<AlertKind, Alert>,
    next_id: AtomicU64,
}

impl AlertManager {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds: Mutex::new(thresholds),
            alerts: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current thresholds
    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Merge a partial update into the running thresholds atomically
    pub fn update_thresholds(&self, update: &ThresholdUpdate) {
        let mut thresholds = self
            .thresholds
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(v) = update.error_rate {
            thresholds.error_rate = v;
        }
        if let Some(v) = update.avg_latency_ms {
            thresholds.avg_latency_ms = v;
        }
        if let Some(v) = update.memory_fraction {
            thresholds.memory_fraction = v;
        }
        if let Some(v) = update.cpu_fraction {
            thresholds.cpu_fraction = v;
        }
        if let Some(v) = update.cost_daily {
            thresholds.cost_daily = v;
        }
        if let Some(v) = update.cost_monthly {
            thresholds.cost_monthly = v;
        }
    }

    /// Raise an alert, or refresh the active one of the same kind
    pub fn raise(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        message: String,
        data: serde_json::Value,
    ) {
        let now = now_millis();

        let mut entry = self.alerts.entry(kind).or_insert_with(|| {
            let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(kind = kind.as_str(), %message, "alert raised");
            Alert {
                id: format!("alert-{}-{seq}", kind.as_str()),
                kind,
                severity,
                message: message.clone(),
                data: data.clone(),
                timestamp: now,
                status: AlertStatus::Active,
            }
        });

        if entry.status == AlertStatus::Resolved {
            // A fresh breach after resolution gets a new identity.
            let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
            entry.id = format!("alert-{}-{seq}", kind.as_str());
            entry.status = AlertStatus::Active;
            tracing::warn!(kind = kind.as_str(), %message, "alert re-raised");
        }

        entry.severity = severity;
        entry.message = message;
        entry.data = data;
        entry.timestamp = now;
    }

    /// Mark the active alert of a kind as resolved, if any
    pub fn resolve(&self, kind: AlertKind) {
        if let Some(mut entry) = self.alerts.get_mut(&kind) {
            if entry.status == AlertStatus::Active {
                entry.status = AlertStatus::Resolved;
                entry.timestamp = now_millis();
                tracing::info!(kind = kind.as_str(), "alert resolved");
            }
        }
    }

    /// All alerts currently active
    pub fn active(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| entry.status == AlertStatus::Active)
            .map(|entry| entry.clone())
            .collect();
        alerts.sort_by(|a, b| a.id.cmp(&b.id));
        alerts
    }

    /// All alerts, active and resolved
    pub fn all(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.iter().map(|entry| entry.clone()).collect();
        alerts.sort_by(|a, b| a.id.cmp(&b.id));
        alerts
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> AlertManager {
        AlertManager::new(AlertThresholds::default())
    }

    #[test]
    fn repeated_breach_does_not_duplicate() {
        let manager = manager();
        for _ in 0..5 {
            manager.raise(
                AlertKind::ErrorRate,
                AlertSeverity::High,
                "error rate over threshold".to_string(),
                serde_json::json!({"rate": 0.3}),
            );
        }

        let active = manager.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, AlertKind::ErrorRate);
    }

    #[test]
    fn resolve_then_breach_gets_new_identity() {
        let manager = manager();
        manager.raise(
            AlertKind::Latency,
            AlertSeverity::Medium,
            "slow".to_string(),
            serde_json::Value::Null,
        );
        let first_id = manager.active()[0].id.clone();

        manager.resolve(AlertKind::Latency);
        assert!(manager.active().is_empty());
        assert_eq!(manager.all().len(), 1);

        manager.raise(
            AlertKind::Latency,
            AlertSeverity::Medium,
            "slow again".to_string(),
            serde_json::Value::Null,
        );
        let second_id = manager.active()[0].id.clone();
        assert_ne!(first_id, second_id);
    }

    #[test]
    fn threshold_updates_merge() {
        let manager = manager();
        manager.update_thresholds(&ThresholdUpdate {
            cost_daily: Some(10.0),
            ..ThresholdUpdate::default()
        });

        let thresholds = manager.thresholds();
        assert!((thresholds.cost_daily - 10.0).abs() < f64::EPSILON);
        // Untouched fields keep their defaults.
        assert!((thresholds.error_rate - 0.1).abs() < f64::EPSILON);
    }
}
