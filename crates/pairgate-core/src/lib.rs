//! Pairgate Core - Shared types and configuration
//!
//! This crate provides the configuration and error types used across all
//! Pairgate components.

pub mod config;
pub mod error;

pub use config::{Config, CREDENTIALS_FILE, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT};
pub use error::{Error, Result};
