// Great-circle distance
pub mod geo;

// Location model, store and throttle
pub mod state;

// Upstream event validation
pub mod event;

// Bulk resync
pub mod fetch;

// Connection state machine and upstream contract
pub mod supervisor;

// NATS upstream
pub mod nats;

// Actor owning all shared state
pub mod hub;

// Per-observer subscriptions
pub mod subscription;

// HTTP and WebSocket APIs
pub mod api;

// Configuration
pub mod config;

pub use hub::{HubConfig, HubState, LocationHub};
pub use state::Location;
pub use subscription::Subscription;
pub use supervisor::ConnectionStatus;
