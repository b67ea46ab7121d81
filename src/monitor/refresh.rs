use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::alerts::SystemAlerts;
use super::history::{MetricPoint, MetricsHistory, Trend};
use super::source::MonitoringSource;
use crate::error::{Error, Result};
use crate::types::{HealthReport, HealthState, MetricsReport, OperationalReport};

/// Status recorded when the health endpoint cannot be read
const UNKNOWN_STATUS: &str = "UNKNOWN";

/// Refresh settings for a [`Monitor`]
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Time between full refreshes
    pub refresh_interval: Duration,
    /// Window requested for operational series
    pub time_range: String,
    /// Audit entries fetched per refresh
    pub audit_limit: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            time_range: "24h".to_string(),
            audit_limit: 50,
        }
    }
}

impl MonitorConfig {
    fn audit_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("limit", self.audit_limit.to_string()),
            ("sortBy", "timestamp".to_string()),
            ("sortOrder", "desc".to_string()),
        ]
    }
}

/// Latest monitoring data
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    pub health: HealthReport,
    pub metrics: MetricsReport,
    pub operational: OperationalReport,
    /// Newest entries first
    pub audit_log: Vec<Value>,
    /// Time of the last refresh where every request succeeded
    pub last_updated: Option<DateTime<Utc>>,
    /// Message of the first failure in the last refresh
    pub error: Option<String>,
    pub is_loading: bool,
}

impl MonitorState {
    pub fn health_state(&self) -> HealthState {
        self.health.state()
    }

    pub fn recent_audit(&self, count: usize) -> &[Value] {
        &self.audit_log[..count.min(self.audit_log.len())]
    }
}

struct Shared {
    source: Arc<dyn MonitoringSource>,
    config: MonitorConfig,
    state: RwLock<MonitorState>,
    history: RwLock<MetricsHistory>,
}

impl Shared {
    async fn refresh_all(&self) -> Result<()> {
        self.state.write().is_loading = true;

        let audit_params = self.config.audit_params();
        let (health, metrics, operational, audit) = tokio::join!(
            self.source.health(),
            self.source.metrics(),
            self.source.operational(&self.config.time_range),
            self.source.audit(&audit_params),
        );

        let now = Utc::now();
        let mut failures = Vec::new();
        {
            let mut state = self.state.write();
            state.is_loading = false;
            self.apply_health(&mut state, health, &mut failures);
            self.apply_metrics(&mut state, metrics, now, &mut failures);
            match operational {
                Ok(operational) => state.operational = operational,
                Err(e) => failures.push(e),
            }
            match audit {
                Ok(entries) => state.audit_log = entries,
                Err(e) => failures.push(e),
            }
        }

        self.finish(failures.into_iter().next(), now, "Monitoring refresh failed")
    }

    async fn refresh_health(&self) -> Result<()> {
        let health = self.source.health().await;
        let mut failures = Vec::new();
        self.apply_health(&mut self.state.write(), health, &mut failures);
        self.finish(failures.into_iter().next(), Utc::now(), "Health refresh failed")
    }

    async fn refresh_metrics(&self) -> Result<()> {
        let (metrics, operational) = tokio::join!(
            self.source.metrics(),
            self.source.operational(&self.config.time_range),
        );

        let now = Utc::now();
        let mut failures = Vec::new();
        {
            let mut state = self.state.write();
            self.apply_metrics(&mut state, metrics, now, &mut failures);
            match operational {
                Ok(operational) => state.operational = operational,
                Err(e) => failures.push(e),
            }
        }
        self.finish(failures.into_iter().next(), now, "Metrics refresh failed")
    }

    fn apply_health(
        &self,
        state: &mut MonitorState,
        health: Result<HealthReport>,
        failures: &mut Vec<Error>,
    ) {
        match health {
            Ok(health) => state.health = health,
            Err(e) => {
                state.health.status = Some(UNKNOWN_STATUS.to_string());
                failures.push(e);
            }
        }
    }

    fn apply_metrics(
        &self,
        state: &mut MonitorState,
        metrics: Result<MetricsReport>,
        at: DateTime<Utc>,
        failures: &mut Vec<Error>,
    ) {
        match metrics {
            Ok(metrics) => {
                let mut history = self.history.write();
                for (name, value) in tracked(&metrics) {
                    history.add_point(name, value, at);
                }
                state.metrics = metrics;
            }
            Err(e) => failures.push(e),
        }
    }

    fn finish(&self, failure: Option<Error>, at: DateTime<Utc>, context: &str) -> Result<()> {
        let mut state = self.state.write();
        match failure {
            None => {
                state.last_updated = Some(at);
                state.error = None;
                Ok(())
            }
            Some(e) => {
                warn!("{}: {}", context, e);
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Metrics recorded in the history on every successful metrics read
fn tracked(metrics: &MetricsReport) -> [(&'static str, f64); 4] {
    [
        ("activeEvents", metrics.active_events as f64),
        ("totalRsvps", metrics.total_rsvps as f64),
        ("systemLoad", metrics.system_load),
        ("errorRate", metrics.error_rate),
    ]
}

/// Polls a [`MonitoringSource`] and keeps the latest state, history and alerts
pub struct Monitor {
    shared: Arc<Shared>,
    alerts: SystemAlerts,
    refresh: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(source: Arc<dyn MonitoringSource>, config: MonitorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                config,
                state: RwLock::new(MonitorState::default()),
                history: RwLock::new(MetricsHistory::new()),
            }),
            alerts: SystemAlerts::new(),
            refresh: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    pub fn state(&self) -> MonitorState {
        self.shared.state.read().clone()
    }

    pub fn health_state(&self) -> HealthState {
        self.shared.state.read().health_state()
    }

    pub fn metric_history(&self, name: &str) -> Vec<MetricPoint> {
        self.shared.history.read().series(name)
    }

    /// Trend of `name` over the last `periods` samples
    pub fn trend(&self, name: &str, periods: usize) -> Option<Trend> {
        self.shared.history.read().trend(name, periods)
    }

    pub fn alerts(&self) -> &SystemAlerts {
        &self.alerts
    }

    /// Fetch everything once
    ///
    /// Requests run concurrently; each successful response is applied even
    /// when another fails. The first failure is returned and kept in
    /// [`MonitorState::error`].
    pub async fn refresh(&self) -> Result<()> {
        self.shared.refresh_all().await
    }

    pub async fn refresh_health(&self) -> Result<()> {
        self.shared.refresh_health().await
    }

    /// Fetch metrics and operational series only
    pub async fn refresh_metrics(&self) -> Result<()> {
        self.shared.refresh_metrics().await
    }

    /// Refresh now and then every `refresh_interval`; no-op while running
    pub fn start(&self) {
        let mut refresh = self.refresh.lock();
        if refresh.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let period = shared.config.refresh_interval;
        *refresh = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if shared.refresh_all().await.is_err() {
                    debug!("Retrying monitoring refresh in {:?}", period);
                }
            }
        }));
        info!("Monitoring started, refreshing every {:?}", period);
    }

    /// Cancel the refresh task; an in-flight refresh is abandoned
    pub fn stop(&self) {
        if let Some(task) = self.refresh.lock().take() {
            task.abort();
            info!("Monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.refresh
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(task) = self.refresh.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
