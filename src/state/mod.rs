// Location state: store, throttle and the location model

mod location;
mod store;
mod throttle;

pub use location::Location;
pub use store::{LocationStore, Snapshot};
pub use throttle::ThrottleGate;
