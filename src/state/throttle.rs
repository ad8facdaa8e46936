// Per-driver admission filter for live location events
//
// A stationary driver produces at most one admitted update per interval;
// a moving driver is admitted as soon as it crosses the distance threshold.

use crate::config::ThrottleConfig;
use crate::geo::distance_meters;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Last admitted update for a single driver.
struct ThrottleRecord {
    last_admitted_at: Instant,
    last_admitted_position: (f64, f64),
}

/// Per-driver time/distance throttle.
///
/// Records are created lazily on first admission and never removed, so
/// throttling history survives reconnects and observer churn.
pub struct ThrottleGate {
    records: DashMap<String, ThrottleRecord>,
    min_interval: Duration,
    min_distance_meters: f64,
}

impl ThrottleGate {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            records: DashMap::new(),
            min_interval: Duration::from_secs(config.min_interval_seconds),
            min_distance_meters: config.min_distance_meters,
        }
    }

    /// Decide whether an update is significant enough to apply.
    ///
    /// Returns true (and records the update) when the driver has never been
    /// seen, when `min_interval` has elapsed since the last admission, or
    /// when it moved at least `min_distance_meters`.
    pub fn admit(&self, entity_id: &str, latitude: f64, longitude: f64, now: Instant) -> bool {
        let mut record = match self.records.get_mut(entity_id) {
            Some(record) => record,
            None => {
                self.records.insert(
                    entity_id.to_string(),
                    ThrottleRecord {
                        last_admitted_at: now,
                        last_admitted_position: (latitude, longitude),
                    },
                );
                return true;
            }
        };

        let elapsed = now.saturating_duration_since(record.last_admitted_at);
        let (last_lat, last_lng) = record.last_admitted_position;
        let moved = distance_meters(last_lat, last_lng, latitude, longitude);

        if elapsed >= self.min_interval || moved >= self.min_distance_meters {
            record.last_admitted_at = now;
            record.last_admitted_position = (latitude, longitude);
            true
        } else {
            false
        }
    }

    /// Number of drivers with a throttle record
    pub fn tracked(&self) -> usize {
        self.records.len()
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(&ThrottleConfig::default())
    }
}
