use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
}

/// Dismissable system alerts, oldest first
///
/// Ids are unique for the lifetime of the list, even across [`clear`](Self::clear).
#[derive(Debug)]
pub struct SystemAlerts {
    alerts: RwLock<Vec<Alert>>,
    next_id: AtomicU64,
}

impl Default for SystemAlerts {
    fn default() -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl SystemAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alert and return its id
    pub fn add(
        &self,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.alerts.write().push(Alert {
            id,
            timestamp: Utc::now(),
            severity,
            title: title.into(),
            message: message.into(),
        });
        id
    }

    /// Dismiss one alert; false if it was not present
    pub fn remove(&self, id: u64) -> bool {
        let mut alerts = self.alerts.write();
        match alerts.iter().position(|a| a.id == id) {
            Some(index) => {
                alerts.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.alerts.write().clear();
    }

    pub fn all(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    pub fn critical(&self) -> Vec<Alert> {
        self.with_severity(AlertSeverity::Critical)
    }

    pub fn warnings(&self) -> Vec<Alert> {
        self.with_severity(AlertSeverity::Warning)
    }

    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }

    fn with_severity(&self, severity: AlertSeverity) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| a.severity == severity)
            .cloned()
            .collect()
    }
}
