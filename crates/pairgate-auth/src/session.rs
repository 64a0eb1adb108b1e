//! Pairing state machine
//!
//! A single `PairingSession` exists per server run. It moves through
//! `Idle -> AwaitingPairing -> Paired` and publishes every change over a
//! `watch` channel so request handlers can wait on transitions instead of
//! sleeping.
//!
//! Once paired, the pairing code and session ID never change. An attempt that
//! ends without a pairing code (timeout, closed connection) returns the state
//! to `Idle` so the next `/pair` request starts a fresh connection.
//!
//! Every attempt is numbered. Writers pass the number they were started with,
//! so events or resets from an abandoned connection cannot touch a newer one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Pairing errors
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Handshake timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),
    #[error("Connection closed before a QR or pairing code arrived")]
    ClosedBeforePairing,
}

pub type PairingResult<T> = Result<T, PairingError>;

impl From<PairingError> for pairgate_core::Error {
    fn from(err: PairingError) -> Self {
        match err {
            PairingError::TimedOut(timeout) => {
                pairgate_core::Error::HandshakeTimedOut(timeout.as_secs())
            }
            PairingError::ClosedBeforePairing => {
                pairgate_core::Error::ConnectionClosed(err.to_string())
            }
        }
    }
}

/// Identifier correlating a completed pairing with its download
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Exact comparison against a raw request parameter
    pub fn matches(&self, candidate: &str) -> bool {
        self.to_string() == candidate
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Progress of the pairing attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPhase {
    /// No connection has been started
    #[default]
    Idle,
    /// Connection started, waiting for the device to pair
    AwaitingPairing,
    /// A pairing code arrived and a session ID was issued
    Paired,
}

/// Point-in-time view of the pairing state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingSnapshot {
    pub phase: PairingPhase,
    /// Number of the most recent attempt, 0 before the first
    #[serde(skip)]
    pub attempt: u64,
    /// QR code as a PNG data URI
    pub qr_image: Option<String>,
    pub pairing_code: Option<String>,
    pub session_id: Option<SessionId>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PairingSnapshot {
    /// Whether the user has something to act on (QR or pairing code)
    pub fn has_token(&self) -> bool {
        self.qr_image.is_some() || self.pairing_code.is_some()
    }

    pub fn is_paired(&self) -> bool {
        self.phase == PairingPhase::Paired
    }
}

/// Shared pairing state with change notification
pub struct PairingSession {
    state: watch::Sender<PairingSnapshot>,
}

impl PairingSession {
    /// Create a new session in the `Idle` phase
    pub fn new() -> Self {
        let (state, _) = watch::channel(PairingSnapshot::default());
        Self { state }
    }

    /// Current state
    pub fn snapshot(&self) -> PairingSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<PairingSnapshot> {
        self.state.subscribe()
    }

    /// Claim the right to start a connection
    ///
    /// Returns the new attempt number for exactly one caller per `Idle`
    /// period, `None` for everyone else.
    pub fn try_begin(&self) -> Option<u64> {
        let mut begun = None;
        self.state.send_if_modified(|s| {
            if s.phase != PairingPhase::Idle {
                return false;
            }
            s.attempt += 1;
            s.phase = PairingPhase::AwaitingPairing;
            s.updated_at = Some(Utc::now());
            begun = Some(s.attempt);
            true
        });

        if let Some(attempt) = begun {
            info!("Pairing attempt {} started", attempt);
        }
        begun
    }

    /// Store a rendered QR image for `attempt`, replacing any earlier one
    ///
    /// Only accepted while `attempt` is awaiting pairing. Once paired the
    /// last QR is kept as is.
    pub fn record_qr(&self, attempt: u64, qr_image: String) -> bool {
        self.state.send_if_modified(|s| {
            if s.phase != PairingPhase::AwaitingPairing || s.attempt != attempt {
                debug!("Dropping QR for attempt {}", attempt);
                return false;
            }
            s.qr_image = Some(qr_image);
            s.updated_at = Some(Utc::now());
            true
        })
    }

    /// Store the pairing code and issue a session ID
    ///
    /// Returns the new session ID, or `None` if the session was already
    /// paired or `attempt` is not in progress.
    pub fn record_pairing_code(&self, attempt: u64, code: String) -> Option<SessionId> {
        let mut issued = None;
        self.state.send_if_modified(|s| {
            if s.phase != PairingPhase::AwaitingPairing || s.attempt != attempt {
                debug!("Ignoring pairing code in phase {:?}", s.phase);
                return false;
            }
            let id = SessionId::new();
            s.phase = PairingPhase::Paired;
            s.pairing_code = Some(code);
            s.session_id = Some(id.clone());
            s.updated_at = Some(Utc::now());
            issued = Some(id);
            true
        });

        if let Some(ref id) = issued {
            info!("Paired, session {}", id);
        }
        issued
    }

    /// Abandon `attempt` if it is still unpaired and return to `Idle`
    ///
    /// A paired session is never reset. Returns `true` if the state changed.
    pub fn reset_unpaired(&self, attempt: u64) -> bool {
        let reset = self.state.send_if_modified(|s| {
            if s.phase != PairingPhase::AwaitingPairing || s.attempt != attempt {
                return false;
            }
            *s = PairingSnapshot {
                attempt,
                updated_at: Some(Utc::now()),
                ..PairingSnapshot::default()
            };
            true
        });

        if reset {
            info!("Pairing attempt {} abandoned, back to idle", attempt);
        }
        reset
    }

    /// The issued session ID, if `candidate` is exactly equal to it
    pub fn find_session(&self, candidate: &str) -> Option<SessionId> {
        self.state
            .borrow()
            .session_id
            .as_ref()
            .filter(|id| id.matches(candidate))
            .cloned()
    }

    /// Wait until a QR or pairing code is available
    ///
    /// Fails with `ClosedBeforePairing` if the attempt is abandoned while
    /// waiting, or `TimedOut` when nothing arrives within `timeout`.
    pub async fn wait_for_token(&self, timeout: Duration) -> PairingResult<PairingSnapshot> {
        let mut rx = self.subscribe();

        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| s.has_token() || s.phase == PairingPhase::Idle),
        )
        .await;

        match waited {
            Ok(Ok(snapshot)) if snapshot.has_token() => Ok(snapshot.clone()),
            Ok(_) => Err(PairingError::ClosedBeforePairing),
            Err(_) => Err(PairingError::TimedOut(timeout)),
        }
    }
}

impl Default for PairingSession {
    fn default() -> Self {
        Self::new()
    }
}
