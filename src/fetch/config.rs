use serde::{Deserialize, Serialize};

/// Configuration for the bulk location query
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL of the data service (PostgREST-style)
    pub base_url: String,

    /// Use the denormalized RPC before falling back to the positions table
    pub primary_enabled: bool,

    /// RPC returning positions joined with driver names and active tasks
    pub primary_rpc: String,

    /// Raw positions table used by the fallback path
    pub positions_table: String,

    /// Column holding the report time in the positions table
    pub timestamp_column: String,

    /// Fallback path only returns positions observed within this window
    pub activity_window_minutes: i64,

    /// Per-request timeout (seconds)
    pub timeout_seconds: u64,

    /// Optional bearer token / API key
    pub api_key: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            primary_enabled: true,
            primary_rpc: "get_driver_locations".to_string(),
            positions_table: "driver_locations".to_string(),
            timestamp_column: "observed_at".to_string(),
            activity_window_minutes: 10,
            timeout_seconds: 10,
            api_key: None,
        }
    }
}
