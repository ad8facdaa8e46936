use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known position of a tracked driver
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Stable driver identifier
    pub entity_id: String,

    /// Human-readable driver name (bulk query only)
    pub display_name: Option<String>,

    pub latitude: f64,
    pub longitude: f64,

    /// When the device reported this position
    pub observed_at: DateTime<Utc>,

    /// Task the driver is currently working, if any
    pub active_task_id: Option<String>,
}

impl Location {
    /// Apply a newer report for the same driver.
    ///
    /// Position and timestamp are always replaced; metadata is only
    /// overwritten when the newer report carries a value.
    pub fn merge_from(&mut self, newer: Location) {
        self.latitude = newer.latitude;
        self.longitude = newer.longitude;
        self.observed_at = newer.observed_at;

        if newer.display_name.is_some() {
            self.display_name = newer.display_name;
        }
        if newer.active_task_id.is_some() {
            self.active_task_id = newer.active_task_id;
        }
    }
}
