use crate::state::Location;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod validation;

pub use validation::{parse_payload, ValidationError};

/// LocationUpdate is a validated live position report for one driver.
///
/// Raw payloads from the upstream feed are untyped JSON; they only become a
/// `LocationUpdate` after passing `LocationUpdate::from_payload`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Driver identifier (strings or integers on the wire)
    pub entity_id: String,

    pub latitude: f64,
    pub longitude: f64,

    /// Device time; defaults to receipt time when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task_id: Option<String>,
}

impl LocationUpdate {
    /// Validates an upstream payload and converts it to a typed update.
    ///
    /// Accepts either a bare record or a change-data-capture envelope
    /// (`{"new": {...}}` / `{"record": {...}}`). Returns Err(ValidationError)
    /// when the driver id or coordinates cannot be identified.
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        validation::parse_payload(payload)
    }

    /// Convert to a store record, stamping `received_at` when the device
    /// time is unknown.
    pub fn into_location(self, received_at: DateTime<Utc>) -> Location {
        Location {
            entity_id: self.entity_id,
            display_name: self.display_name,
            latitude: self.latitude,
            longitude: self.longitude,
            observed_at: self.observed_at.unwrap_or(received_at),
            active_task_id: self.active_task_id,
        }
    }
}
