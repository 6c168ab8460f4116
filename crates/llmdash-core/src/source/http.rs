//! HTTP client for pipe-style metrics APIs

use chrono::NaiveDateTime;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::wire::{GroupRow, ModelRow, PipeResponse, RawMetricRow};
use super::MetricsSource;
use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::models::{Catalog, FilterSet, MetricRow, TimeRange};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Metrics source backed by `GET {api_url}/pipes/{pipe}.json` endpoints
#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    client: Client,
    config: SourceConfig,
}

impl HttpMetricsSource {
    /// Create a new source client
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn pipe_url(&self, pipe: &str) -> String {
        format!(
            "{}/pipes/{}.json",
            self.config.api_url.trim_end_matches('/'),
            pipe
        )
    }

    /// Query parameters for a metrics request. Filters are comma-joined and
    /// omitted entirely when empty.
    fn metrics_params(range: &TimeRange, filters: &FilterSet) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("start_time", format_time(range.start)),
            ("end_time", format_time(range.end)),
        ];
        if !filters.models.is_empty() {
            params.push(("model", join(&filters.models)));
        }
        if !filters.groups.is_empty() {
            params.push(("group", join(&filters.groups)));
        }
        params
    }

    async fn get_pipe<T: DeserializeOwned>(
        &self,
        pipe: &str,
        params: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let url = self.pipe_url(pipe);
        debug!(url = %url, params = ?params, "Querying metrics source");

        let mut request = self.client.get(&url).query(params);
        if !self.config.api_token.is_empty() {
            request = request.bearer_auth(&self.config.api_token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Metrics source request failed");
            Error::source_transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::source_transport(e.to_string()))?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Metrics source returned an error");
            return Err(Error::source_status(status.as_u16(), body));
        }

        let envelope: PipeResponse<T> = serde_json::from_str(&body)
            .map_err(|e| Error::source_transport(format!("invalid response from {pipe}: {e}")))?;

        Ok(envelope.data)
    }
}

#[async_trait::async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch_raw(&self, range: &TimeRange, filters: &FilterSet) -> Result<Vec<MetricRow>> {
        let params = Self::metrics_params(range, filters);
        let raw: Vec<RawMetricRow> = self.get_pipe(&self.config.metrics_pipe, &params).await?;

        let total = raw.len();
        let rows: Vec<MetricRow> = raw.iter().filter_map(RawMetricRow::normalize).collect();
        if rows.len() < total {
            warn!(
                skipped = total - rows.len(),
                "Skipped metric rows without a usable timestamp"
            );
        }

        debug!(rows = rows.len(), range = %range, "Fetched raw metrics");
        Ok(rows)
    }

    async fn fetch_catalog(&self) -> Result<Catalog> {
        let models: Vec<ModelRow> = self.get_pipe(&self.config.models_pipe, &[]).await?;
        let groups: Vec<GroupRow> = self.get_pipe(&self.config.groups_pipe, &[]).await?;

        let catalog = Catalog {
            models: models.into_iter().filter_map(|r| r.model).collect(),
            groups: groups.into_iter().filter_map(|r| r.group_id).collect(),
        };

        debug!(
            models = catalog.models.len(),
            groups = catalog.groups.len(),
            "Fetched catalog"
        );
        Ok(catalog)
    }
}

fn format_time(ts: NaiveDateTime) -> String {
    ts.format(TIME_FORMAT).to_string()
}

fn join<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
