use async_trait::async_trait;
use serde_json::Value;

use crate::client::MonitoringApi;
use crate::error::Result;
use crate::types::{HealthReport, MetricsReport, OperationalReport};

/// Where the [`Monitor`](super::Monitor) reads monitoring data from
#[async_trait]
pub trait MonitoringSource: Send + Sync + 'static {
    async fn health(&self) -> Result<HealthReport>;
    async fn metrics(&self) -> Result<MetricsReport>;
    async fn operational(&self, time_range: &str) -> Result<OperationalReport>;
    async fn audit(&self, params: &[(&str, String)]) -> Result<Vec<Value>>;
}

#[async_trait]
impl MonitoringSource for MonitoringApi {
    async fn health(&self) -> Result<HealthReport> {
        MonitoringApi::health(self).await
    }

    async fn metrics(&self) -> Result<MetricsReport> {
        MonitoringApi::metrics(self).await
    }

    async fn operational(&self, time_range: &str) -> Result<OperationalReport> {
        MonitoringApi::operational(self, time_range).await
    }

    async fn audit(&self, params: &[(&str, String)]) -> Result<Vec<Value>> {
        MonitoringApi::audit(self, params).await
    }
}
