//! Pairgate Server - Axum-based HTTP server
//!
//! This crate provides the pairing page, the session download endpoint and
//! the glue that drives the messaging client connection.

pub mod archive;
pub mod http;
pub mod initiator;
pub mod state;

pub use archive::{archive_name, ArchiveExporter, SessionArchive};
pub use http::{create_router, INVALID_SESSION_MESSAGE, READY_MESSAGE};
pub use initiator::ConnectionInitiator;
pub use state::AppState;
