//! Shared application state

use crate::archive::ArchiveExporter;
use crate::initiator::ConnectionInitiator;
use pairgate_auth::{PairingSession, SessionStore};
use pairgate_bridge::MessagingClient;
use pairgate_core::Config;
use std::sync::Arc;

/// Shared application state
///
/// Created once at startup and handed to every handler.
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Pairing progress, written by the connection's event pump
    pub pairing: Arc<PairingSession>,
    /// Session directory owned by the messaging client
    pub store: Arc<SessionStore>,
    /// Starts the messaging connection on demand
    pub initiator: ConnectionInitiator,
    /// Builds download archives
    pub exporter: ArchiveExporter,
}

impl AppState {
    /// Create a new application state
    pub fn new(
        config: Config,
        client: Arc<dyn MessagingClient>,
        store: Arc<SessionStore>,
    ) -> Self {
        let pairing = Arc::new(PairingSession::new());
        let initiator = ConnectionInitiator::new(
            client,
            pairing.clone(),
            store.clone(),
            config.handshake_timeout,
        )
        .with_print_qr(config.print_qr);
        let exporter = ArchiveExporter::new(store.clone(), config.archive_dir.clone());

        Self {
            config,
            pairing,
            store,
            initiator,
            exporter,
        }
    }

    /// Close the messaging connection
    pub fn shutdown(&self) {
        self.initiator.shutdown();
    }
}
