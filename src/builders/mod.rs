//! Builders
//!
//! Fluent builder patterns for session configuration and clients.

pub mod config;

pub use config::{session_config, SessionConfigBuilder};
