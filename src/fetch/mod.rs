// Bulk resynchronization of all driver locations

mod config;
mod http;


pub use config::FetchConfig;
pub use http::HttpBulkFetcher;

use crate::state::Location;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Full resync source for the location store.
///
/// Implementations return the complete current set of drivers; callers
/// replace their state wholesale with the result.
#[async_trait]
pub trait BulkFetcher: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Location>>;
}

/// Keep exactly one row per driver, preferring the latest `observed_at`.
///
/// On equal timestamps the first row wins.
pub fn dedupe_latest(rows: Vec<Location>) -> Vec<Location> {
    let mut latest: HashMap<String, Location> = HashMap::with_capacity(rows.len());

    for row in rows {
        match latest.get(&row.entity_id) {
            Some(existing) if existing.observed_at >= row.observed_at => {}
            _ => {
                latest.insert(row.entity_id.clone(), row);
            }
        }
    }

    latest.into_values().collect()
}

/// Drop rows observed before `now - window`
pub fn within_activity_window(
    rows: Vec<Location>,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<Location> {
    let cutoff = now - window;
    rows.into_iter().filter(|row| row.observed_at >= cutoff).collect()
}
