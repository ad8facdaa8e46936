// NATS upstream for the live location feed

mod client;

pub use client::{NatsConfig, NatsConnector};
