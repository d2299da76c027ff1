//! WebSocket transport for the upstream feed

pub mod client;
pub mod connection;

pub use client::{FeedClient, ReconnectPolicy};
pub use connection::{FeedConnection, WebSocketError};
