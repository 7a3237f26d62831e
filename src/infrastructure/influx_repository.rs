// InfluxDB reading source implementation
use crate::application::reading_source::ReadingSource;
use crate::domain::reading::Reading;
use crate::infrastructure::config::{prepare_query, InfluxSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InfluxRepository {
    client: reqwest::Client,
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    range_query: String,
    latest_query: String,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxRepository {
    pub fn new(settings: &InfluxSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("Failed to build InfluxDB HTTP client")?;

        Ok(Self {
            client,
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            database: settings.database.clone(),
            retention_policy: settings.retention_policy.clone(),
            range_query: settings.range_query.clone(),
            latest_query: settings.latest_query.clone(),
        })
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    fn render(&self, template: &str, panel_id: &str, window: Option<(DateTime<Utc>, DateTime<Utc>)>) -> String {
        let mut vars = HashMap::new();
        vars.insert("panel".to_string(), panel_id.replace('\'', "\\'"));
        if let Some((start, end)) = window {
            vars.insert("start".to_string(), start.to_rfc3339_opts(SecondsFormat::Secs, true));
            vars.insert("end".to_string(), end.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        prepare_query(template, &vars)
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        // Check for errors in the response
        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("InfluxDB query error: {}", error);
            }
        }

        Ok(data)
    }
}

/// Turn InfluxQL rows into readings; columns named `<metric>_<phase>` become values
fn readings_from_response(response: &InfluxQLResponse, panel_id: &str) -> Vec<Reading> {
    let mut readings = Vec::new();
    let Some(series) = response.results.first().and_then(|r| r.series.as_ref()) else {
        return readings;
    };

    for s in series {
        let time_idx = s.columns.iter().position(|c| c == "time").unwrap_or(0);
        let fields: Vec<(usize, _)> = s
            .columns
            .iter()
            .enumerate()
            .filter_map(|(idx, column)| Reading::parse_column(column).map(|mp| (idx, mp)))
            .collect();

        for row in &s.values {
            let Some(time) = row
                .get(time_idx)
                .and_then(|v| v.as_str())
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            else {
                tracing::debug!("Skipping InfluxDB row without a valid time for {}", panel_id);
                continue;
            };

            let mut reading = Reading::new(time.with_timezone(&Utc), panel_id.to_string());
            for (idx, (metric, phase)) in &fields {
                if let Some(value) = row.get(*idx).and_then(|v| v.as_f64()) {
                    reading.set_value(*metric, *phase, value);
                }
            }
            readings.push(reading);
        }
    }

    readings
}

#[async_trait]
impl ReadingSource for InfluxRepository {
    async fn latest_reading(&self, panel_id: &str) -> Result<Option<Reading>> {
        let query = self.render(&self.latest_query, panel_id, None);
        tracing::debug!("Executing latest reading query: {}", query);

        let response = self.execute_query(&query).await?;
        Ok(readings_from_response(&response, panel_id)
            .into_iter()
            .max_by_key(|r| r.timestamp))
    }

    async fn readings_in_range(
        &self,
        panel_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let query = self.render(&self.range_query, panel_id, Some((start, end)));
        tracing::debug!("Executing range query: {}", query);

        let response = self.execute_query(&query).await?;
        let readings = readings_from_response(&response, panel_id);
        tracing::debug!("Got {} readings from InfluxDB for panel {}", readings.len(), panel_id);
        Ok(readings)
    }
}
