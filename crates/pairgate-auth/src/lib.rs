//! Pairgate Auth - Pairing state and session storage
//!
//! Tracks the progress of a single pairing attempt with the external
//! messaging client and owns the on-disk session directory it writes to.
//!
//! # Pairing Flow
//!
//! 1. The first `/pair` request calls `PairingSession::try_begin()`, moving
//!    the state from `Idle` to `AwaitingPairing`
//! 2. The messaging client emits QR payloads, which are stored as PNG data URIs
//! 3. When a pairing code arrives, a session ID is generated and the state
//!    becomes `Paired`
//! 4. The session ID unlocks the download of the session directory
//!
//! # Example
//!
//! ```no_run
//! use pairgate_auth::PairingSession;
//! use std::time::Duration;
//!
//! async fn example() {
//!     let session = PairingSession::new();
//!     if let Some(attempt) = session.try_begin() {
//!         // start the messaging client connection for `attempt` here
//!         println!("starting attempt {}", attempt);
//!     }
//!
//!     match session.wait_for_token(Duration::from_secs(3)).await {
//!         Ok(snapshot) => println!("QR ready: {}", snapshot.qr_image.is_some()),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

pub mod qr;
pub mod session;
pub mod storage;

pub use qr::{encode_data_uri, render_terminal, QrError, DATA_URI_PREFIX};
pub use session::{
    PairingError, PairingPhase, PairingResult, PairingSession, PairingSnapshot, SessionId,
};
pub use storage::{SessionStore, StoreError, StoreResult};
