//! Data Model
//!
//! Token and wire-format type definitions.

pub mod auth;
pub mod config;
pub mod token;

pub use auth::{AuthResponse, AuthSection, LookupData, LookupResponse};
pub use config::SessionConfig;
pub use token::{LoginToken, RenewOutcome, SessionToken, TokenWrapper, VaultToken};
