//! # examdash-client
//!
//! Wires the feed core to a real server:
//! - [`ClientConfig`] from `EXAMDASH_*` environment variables
//! - [`HttpFeedSource`], the REST side of a feed
//! - [`FeedController`], mount/unmount, refresh and optimistic actions
//! - [`Session`], role-gated mounting and reconnect-driven resync

pub mod config;
pub mod controller;
pub mod session;
pub mod source;

pub use config::ClientConfig;
pub use controller::FeedController;
pub use session::{Session, SessionOptions};
pub use source::{default_path, HttpFeedSource};
