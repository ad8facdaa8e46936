// Observer subscriptions and the WebSocket bridge

pub mod adapter;
pub mod manager;
pub mod protocol;

pub use adapter::{Change, Subscription};
pub use manager::ConnectionManager;
pub use protocol::{ClientMessage, ServerMessage};
