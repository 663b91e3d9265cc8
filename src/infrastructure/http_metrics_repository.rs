// Backend HTTP repository implementation
use crate::application::metrics_repository::{RawMetricRecord, SiteMetricsRepository};
use crate::domain::period::PeriodKey;
use crate::infrastructure::config::BackendSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpMetricsRepository {
    client: reqwest::Client,
    base_url: String,
    metrics_path: String,
    token: Option<String>,
}

impl HttpMetricsRepository {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build backend HTTP client")?;

        let metrics_path = if settings.metrics_path.starts_with('/') {
            settings.metrics_path.clone()
        } else {
            format!("/{}", settings.metrics_path)
        };

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            metrics_path,
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn build_metrics_url(&self, period: PeriodKey) -> String {
        format!(
            "{}{}?year={}&semester={}",
            self.base_url,
            self.metrics_path,
            period.year,
            period.half.number()
        )
    }
}

#[async_trait]
impl SiteMetricsRepository for HttpMetricsRepository {
    async fn fetch_site_metrics(&self, period: PeriodKey) -> Result<Vec<RawMetricRecord>> {
        let url = self.build_metrics_url(period);
        tracing::debug!("Requesting site metrics: {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to metrics backend")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Metrics backend responded with status {}: {}", status, body);
        }

        let records = response
            .json::<Vec<RawMetricRecord>>()
            .await
            .context("Failed to parse metrics backend response")?;

        tracing::debug!("Received {} site metric rows for {}", records.len(), period);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::period::HalfYear;

    fn settings(base_url: &str, metrics_path: &str) -> BackendSettings {
        BackendSettings {
            base_url: base_url.to_string(),
            metrics_path: metrics_path.to_string(),
            token: Some(String::new()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_build_metrics_url() {
        let repo = HttpMetricsRepository::new(&settings("http://backend.local/", "site-metrics")).unwrap();
        let url = repo.build_metrics_url(PeriodKey::new(2024, HalfYear::Second));

        assert_eq!(url, "http://backend.local/site-metrics?year=2024&semester=2");
        assert!(repo.token.is_none());
    }

    #[test]
    fn test_decode_backend_rows() {
        let body = r#"[
            {"siteId": 7, "siteName": "North", "monthNumber": 3, "visits": 2, "mass": 5.5, "volume": null},
            {"siteId": "8", "monthNumber": 4}
        ]"#;

        let rows: Vec<RawMetricRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].site_name.as_deref(), Some("North"));
        assert!(rows[0].volume.is_none());
        assert!(rows[0].dispatches.is_none());
        assert!(rows[1].site_name.is_none());
    }
}
