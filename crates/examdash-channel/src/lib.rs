//! # examdash-channel
//!
//! The push channel of an examdash session.
//!
//! A [`ChannelHandle`] keeps a listener registry keyed by event type and a
//! reconnect loop that drives a [`Transport`]. Feeds register one listener
//! each; frames are decoded once and dispatched synchronously so two events
//! arriving back to back are handled in receipt order.
//!
//! Transports:
//! - [`WebSocketTransport`] for the dashboard server
//! - [`BroadcastTransport`] for in-process delivery and tests

pub mod handle;
pub mod reconnect;
pub mod transport;
pub mod websocket;

pub use handle::{ChannelHandle, ConnectionState, ListenerId};
pub use reconnect::ReconnectPolicy;
pub use transport::{BroadcastTransport, Connection, Transport};
pub use websocket::WebSocketTransport;
