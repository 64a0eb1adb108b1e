//! Messaging client connection lifecycle
//!
//! The first `/pair` request opens a connection and spawns a pump that feeds
//! client events into the pairing state. Requests then wait, bounded by the
//! handshake timeout, for a QR or pairing code to show up.

use pairgate_auth::{
    encode_data_uri, render_terminal, PairingPhase, PairingSession, PairingSnapshot, SessionStore,
};
use pairgate_bridge::{ClientEvent, ConnectOptions, EventStream, MessagingClient};
use pairgate_core::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Starts at most one messaging connection per pairing attempt
pub struct ConnectionInitiator {
    client: Arc<dyn MessagingClient>,
    pairing: Arc<PairingSession>,
    store: Arc<SessionStore>,
    handshake_timeout: Duration,
    print_qr: bool,
    /// Event pump of the current attempt
    pump: Mutex<Option<(u64, JoinHandle<()>)>>,
}

impl ConnectionInitiator {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        pairing: Arc<PairingSession>,
        store: Arc<SessionStore>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            client,
            pairing,
            store,
            handshake_timeout,
            print_qr: false,
            pump: Mutex::new(None),
        }
    }

    /// Echo QR payloads to the terminal
    pub fn with_print_qr(mut self, print_qr: bool) -> Self {
        self.print_qr = print_qr;
        self
    }

    /// Start a connection if idle, then wait for something to show
    ///
    /// Returns the snapshot as soon as a QR or pairing code is available.
    /// A timed-out attempt is torn down and the state returns to `Idle`.
    pub async fn ensure_started(&self) -> Result<PairingSnapshot> {
        let Some(attempt) = self.pairing.try_begin() else {
            let snapshot = self.pairing.snapshot();
            if snapshot.phase == PairingPhase::AwaitingPairing && !snapshot.has_token() {
                debug!("Connection already starting, waiting for it");
                return Ok(self.pairing.wait_for_token(self.handshake_timeout).await?);
            }
            return Ok(snapshot);
        };

        if let Err(e) = self.start(attempt).await {
            warn!("Failed to start messaging connection: {}", e);
            self.pairing.reset_unpaired(attempt);
            return Err(e);
        }

        match self.pairing.wait_for_token(self.handshake_timeout).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!("Pairing attempt {} failed: {}", attempt, e);
                self.abort(attempt);
                self.pairing.reset_unpaired(attempt);
                Err(e.into())
            }
        }
    }

    /// Open the connection and spawn its event pump
    async fn start(&self, attempt: u64) -> Result<()> {
        let version = self.client.latest_version().await?;
        let credentials = self.store.load_credentials().await?;
        info!(
            "Connecting {} (protocol {}, stored credentials: {})",
            self.client.name(),
            version,
            credentials.is_some()
        );

        let events = self
            .client
            .connect(ConnectOptions::new(version, credentials))
            .await?;

        let pump = tokio::spawn(run_event_pump(
            attempt,
            events,
            self.pairing.clone(),
            self.store.clone(),
            self.print_qr,
        ));

        if let Ok(mut guard) = self.pump.lock() {
            if let Some((old, handle)) = guard.replace((attempt, pump)) {
                debug!("Replacing event pump of attempt {}", old);
                handle.abort();
            }
        }
        Ok(())
    }

    /// Tear down the connection of `attempt` if it is still current
    fn abort(&self, attempt: u64) {
        if let Ok(mut guard) = self.pump.lock() {
            if matches!(guard.as_ref(), Some((current, _)) if *current == attempt) {
                if let Some((_, handle)) = guard.take() {
                    handle.abort();
                }
            }
        }
    }

    /// Tear down whatever connection is open
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.pump.lock() {
            if let Some((attempt, handle)) = guard.take() {
                info!("Closing messaging connection of attempt {}", attempt);
                handle.abort();
            }
        }
    }
}

/// Feed client events into the pairing state until the connection closes
async fn run_event_pump(
    attempt: u64,
    mut events: EventStream,
    pairing: Arc<PairingSession>,
    store: Arc<SessionStore>,
    print_qr: bool,
) {
    while let Some(event) = events.recv().await {
        handle_event(attempt, event, &pairing, &store, print_qr).await;
    }

    if pairing.reset_unpaired(attempt) {
        warn!("Messaging connection closed before pairing");
    } else {
        info!("Messaging connection closed");
    }
}

async fn handle_event(
    attempt: u64,
    event: ClientEvent,
    pairing: &PairingSession,
    store: &SessionStore,
    print_qr: bool,
) {
    match event {
        ClientEvent::ConnectionUpdate(update) => {
            if let Some(payload) = update.qr {
                if print_qr {
                    display_qr_code(&payload);
                }
                match encode_data_uri(&payload) {
                    Ok(image) => {
                        if pairing.record_qr(attempt, image) {
                            info!("QR code ready");
                        }
                    }
                    Err(e) => warn!("Failed to render QR code: {}", e),
                }
            }

            if let Some(code) = update.pairing_code {
                pairing.record_pairing_code(attempt, code);
            }
        }
        ClientEvent::CredentialsUpdate { creds } => {
            if let Err(e) = store.save_credentials(&creds).await {
                warn!("Failed to save credentials: {}", e);
            }
        }
    }
}

/// Display a QR code in the terminal
fn display_qr_code(payload: &str) {
    match render_terminal(payload) {
        Ok(text) => {
            for line in text.lines() {
                println!("  {}", line);
            }
        }
        Err(e) => warn!("Failed to generate terminal QR code: {}", e),
    }
}
