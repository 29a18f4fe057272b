//! HTTP client for the metric catalog service.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use rights_core::error::RightsError;
use rights_core::ports::{MetricCatalog, Result};
use rights_core::types::Metric;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct MetricList {
    #[serde(default)]
    metrics: Vec<Metric>,
}

#[derive(Debug, Serialize)]
struct CopyMetricRequest<'a> {
    metric_name: &'a str,
    metric_type: &'a str,
    sender_scope: &'a str,
    receiver_scope: &'a str,
}

/// `MetricCatalog` backed by the metric service's REST API.
pub struct HttpMetricCatalog {
    http: Client,
    base_url: String,
}

impl HttpMetricCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create metric service HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!(
        "metric service {what} returned {status}: {}",
        body.chars().take(200).collect::<String>()
    ))
}

fn unavailable(op: &str, e: anyhow::Error) -> RightsError {
    tracing::error!(op, error = %e, "metric service call failed");
    RightsError::ServiceUnavailable("ServiceError".into())
}

#[async_trait]
impl MetricCatalog for HttpMetricCatalog {
    async fn list_metrics(&self, scope: &str) -> Result<Vec<Metric>> {
        let fetch = async {
            let response = self
                .http
                .get(self.url("/api/v1/metrics"))
                .query(&[("scope", scope)])
                .header("Accept", "application/json")
                .send()
                .await
                .context("list metrics request")?;
            let list: MetricList = check_status(response, "list")
                .await?
                .json()
                .await
                .context("parsing metric list")?;
            anyhow::Ok(list.metrics)
        };
        fetch.await.map_err(|e| unavailable("list_metrics", e))
    }

    async fn copy_metric(
        &self,
        metric: &Metric,
        sender_scope: &str,
        receiver_scope: &str,
    ) -> Result<()> {
        let body = CopyMetricRequest {
            metric_name: &metric.name,
            metric_type: &metric.metric_type,
            sender_scope,
            receiver_scope,
        };
        let send = async {
            let response = self
                .http
                .post(self.url("/api/v1/metrics/copy"))
                .json(&body)
                .send()
                .await
                .context("copy metric request")?;
            check_status(response, "copy").await?;
            anyhow::Ok(())
        };
        send.await.map_err(|e| unavailable("copy_metric", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client =
            HttpMetricCatalog::new("http://metrics:8080/", Duration::from_millis(100)).unwrap();
        assert_eq!(
            client.url("/api/v1/metrics"),
            "http://metrics:8080/api/v1/metrics"
        );
    }

    #[test]
    fn metric_list_tolerates_missing_field() {
        let list: MetricList = serde_json::from_str("{}").unwrap();
        assert!(list.metrics.is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let client =
            HttpMetricCatalog::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        let err = client.list_metrics("s1").await.unwrap_err();
        assert!(matches!(err, RightsError::ServiceUnavailable(_)));
        assert_eq!(err.public_message(), "ServiceError");
    }
}
