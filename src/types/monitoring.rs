use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Overall system state derived from a health report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl HealthState {
    /// Map a backend status string; case-insensitive
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "UP" | "HEALTHY" => HealthState::Healthy,
            "DOWN" | "UNHEALTHY" => HealthState::Unhealthy,
            "DEGRADED" | "WARNING" => HealthState::Degraded,
            _ => HealthState::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            HealthState::Healthy => "All systems operational",
            HealthState::Degraded => "Performance issues",
            HealthState::Unhealthy => "System issues detected",
            HealthState::Unknown => "Status unknown",
        }
    }
}

/// Response of `GET /monitoring/health`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: Option<String>,
    /// Uptime as reported by the backend
    #[serde(default)]
    pub uptime: f64,
    /// Per-component details (database, memory, disk, api, services)
    #[serde(default)]
    pub components: Map<String, Value>,
}

impl HealthReport {
    pub fn state(&self) -> HealthState {
        self.status
            .as_deref()
            .map_or(HealthState::Unknown, HealthState::from_status)
    }

    pub fn component(&self, name: &str) -> Option<&Value> {
        self.components.get(name)
    }
}

/// Response of `GET /monitoring/metrics`; absent fields read as zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsReport {
    // system
    pub active_events: u64,
    pub total_members: u64,
    pub total_chapters: u64,
    pub total_rsvps: u64,
    pub system_load: f64,
    // events
    pub today_events: u64,
    pub weekly_events: u64,
    pub monthly_events: u64,
    pub average_attendance: f64,
    // rsvps
    pub today_rsvps: u64,
    pub pending_rsvps: u64,
    pub confirmed_rsvps: u64,
    pub waitlist_count: u64,
    // performance
    pub avg_response_time: f64,
    pub requests_per_minute: f64,
    pub error_rate: f64,
    /// Availability percentage; 100 when not reported
    pub uptime: f64,
}

impl Default for MetricsReport {
    fn default() -> Self {
        Self {
            active_events: 0,
            total_members: 0,
            total_chapters: 0,
            total_rsvps: 0,
            system_load: 0.0,
            today_events: 0,
            weekly_events: 0,
            monthly_events: 0,
            average_attendance: 0.0,
            today_rsvps: 0,
            pending_rsvps: 0,
            confirmed_rsvps: 0,
            waitlist_count: 0,
            avg_response_time: 0.0,
            requests_per_minute: 0.0,
            error_rate: 0.0,
            uptime: 100.0,
        }
    }
}

/// Response of `GET /monitoring/operational`; chart series are passed through
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationalReport {
    pub rsvp_trends: Vec<Value>,
    pub event_capacity_data: Vec<Value>,
    pub user_activity_data: Vec<Value>,
    pub system_performance_data: Vec<Value>,
}
