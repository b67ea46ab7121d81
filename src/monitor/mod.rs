//! Periodic system monitoring.
//!
//! - [`Monitor`]: polls health, metrics, operational series and the audit
//!   trail on a fixed interval and keeps the latest [`MonitorState`]
//! - [`MetricsHistory`]: bounded samples per metric with [`Trend`] calculation
//! - [`SystemAlerts`]: dismissable alerts filtered by severity
//!
//! The refresh task runs from [`Monitor::start`] until [`Monitor::stop`] or
//! until the monitor is dropped.

mod alerts;
mod history;
mod refresh;
mod source;

pub use alerts::{Alert, AlertSeverity, SystemAlerts};
pub use history::{MetricPoint, MetricsHistory, Trend, TrendDirection};
pub use refresh::{Monitor, MonitorConfig, MonitorState};
pub use source::MonitoringSource;
