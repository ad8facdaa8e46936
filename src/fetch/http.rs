use super::{dedupe_latest, within_activity_window, BulkFetcher, FetchConfig};
use crate::state::Location;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Row shape returned by both the RPC and the positions table.
///
/// Aliases cover the column names typical driver location tables use.
#[derive(Debug, Deserialize)]
struct LocationRow {
    #[serde(alias = "driver_id")]
    entity_id: String,
    #[serde(default, alias = "driver_name")]
    display_name: Option<String>,
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lng")]
    longitude: f64,
    #[serde(alias = "updated_at")]
    observed_at: DateTime<Utc>,
    #[serde(default, alias = "current_task_id")]
    active_task_id: Option<String>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Self {
            entity_id: row.entity_id,
            display_name: row.display_name,
            latitude: row.latitude,
            longitude: row.longitude,
            observed_at: row.observed_at,
            active_task_id: row.active_task_id,
        }
    }
}

/// Bulk fetcher for a PostgREST-style HTTP data service.
///
/// Primary path: `POST {base_url}/rpc/{primary_rpc}` returning denormalized
/// rows. Fallback: `GET {base_url}/{positions_table}` limited to the
/// activity window and deduplicated per driver.
pub struct HttpBulkFetcher {
    http_client: Client,
    config: FetchConfig,
}

impl HttpBulkFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent("fleetcast/0.1")
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Denormalized rows including driver names and active tasks
    async fn fetch_primary(&self) -> Result<Vec<Location>> {
        let url = self.url(&format!("rpc/{}", self.config.primary_rpc));

        let rows: Vec<LocationRow> = self
            .authorize(self.http_client.post(&url))
            .json(&serde_json::json!({}))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .context("Primary location query rejected")?
            .json()
            .await
            .context("Failed to decode primary location rows")?;

        Ok(dedupe_latest(rows.into_iter().map(Location::from).collect()))
    }

    /// Raw positions observed within the activity window, one per driver
    async fn fetch_fallback(&self, now: DateTime<Utc>) -> Result<Vec<Location>> {
        let url = self.url(&self.config.positions_table);
        let window = Duration::minutes(self.config.activity_window_minutes);
        let cutoff = now - window;
        let column = self.config.timestamp_column.as_str();

        let rows: Vec<LocationRow> = self
            .authorize(self.http_client.get(&url))
            .query(&[
                ("select", "*".to_string()),
                (column, format!("gte.{}", cutoff.to_rfc3339())),
                ("order", format!("{}.desc", column)),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .context("Fallback location query rejected")?
            .json()
            .await
            .context("Failed to decode fallback location rows")?;

        let total = rows.len();
        let rows = within_activity_window(rows.into_iter().map(Location::from).collect(), now, window);
        let locations = dedupe_latest(rows);

        debug!(rows = total, drivers = locations.len(), "Fallback location query complete");
        Ok(locations)
    }
}

#[async_trait]
impl BulkFetcher for HttpBulkFetcher {
    async fn fetch_all(&self) -> Result<Vec<Location>> {
        if self.config.primary_enabled {
            match self.fetch_primary().await {
                Ok(locations) => {
                    info!(drivers = locations.len(), "Fetched driver locations");
                    return Ok(locations);
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(error = %reason, "Primary location query failed, using positions table");
                }
            }
        }

        let locations = self.fetch_fallback(Utc::now()).await?;
        info!(drivers = locations.len(), "Fetched driver locations from positions table");
        Ok(locations)
    }
}
