use std::time::Duration;

use serde_json::Value;

use crate::error::Result;
use crate::http::HttpClient;
use crate::types::{HealthReport, MetricsReport, OperationalReport};

/// Client for the read-only monitoring endpoints
#[derive(Debug, Clone)]
pub struct MonitoringApi {
    http_client: HttpClient,
}

impl MonitoringApi {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(host),
        }
    }

    pub fn with_timeout(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: HttpClient::with_timeout(host, timeout),
        }
    }

    /// Overall system health and per-component status
    pub async fn health(&self) -> Result<HealthReport> {
        self.http_client.get("/monitoring/health", None).await
    }

    /// Application, event, RSVP and performance counters
    pub async fn metrics(&self) -> Result<MetricsReport> {
        self.http_client.get("/monitoring/metrics", None).await
    }

    /// Operational chart series over `time_range` (e.g. "24h", "7d")
    pub async fn operational(&self, time_range: &str) -> Result<OperationalReport> {
        let params = [("timeRange", time_range.to_string())];
        self.http_client
            .get("/monitoring/operational", Some(&params[..]))
            .await
    }

    /// Audit trail entries; entry shape belongs to the backend
    pub async fn audit(&self, params: &[(&str, String)]) -> Result<Vec<Value>> {
        self.http_client
            .get("/monitoring/audit", Self::query(params))
            .await
    }

    fn query<'a>(params: &'a [(&'a str, String)]) -> Option<&'a [(&'a str, String)]> {
        (!params.is_empty()).then_some(params)
    }
}
