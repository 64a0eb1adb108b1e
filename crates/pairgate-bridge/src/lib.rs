//! Pairgate Bridge
//!
//! Drives the external messaging client that performs the actual protocol
//! handshake:
//!
//! - **`MessagingClient`**: the seam the server talks to. It reports the
//!   latest protocol version and opens a connection that yields a stream of
//!   `ClientEvent`s (QR payloads, pairing codes, credential updates).
//!
//! - **`ProcessBridge`**: runs an external client program and reads one JSON
//!   event per line from its stdout.

mod error;
mod event;
mod process;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{BridgeError, BridgeResult};
pub use event::{parse_event, ClientEvent, ConnectionUpdate, ProtocolVersion};
pub use process::ProcessBridge;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Events emitted by an open connection; `None` means the connection closed
pub type EventStream = mpsc::Receiver<ClientEvent>;

/// Buffered events per connection
pub const EVENT_BUFFER: usize = 32;

/// Options for opening a connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Protocol version reported by `latest_version`
    pub version: ProtocolVersion,
    /// Previously stored credentials, if any
    pub credentials: Option<Value>,
    /// Let the client print QR codes to its own terminal
    pub print_qr_in_terminal: bool,
    /// Ask the client to generate high quality link previews
    pub high_quality_link_preview: bool,
}

impl ConnectOptions {
    pub fn new(version: ProtocolVersion, credentials: Option<Value>) -> Self {
        Self {
            version,
            credentials,
            print_qr_in_terminal: false,
            high_quality_link_preview: true,
        }
    }
}

/// External messaging client
///
/// Implementations own the protocol; the server only consumes events.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Human-readable client name
    fn name(&self) -> &str;

    /// Latest protocol version supported by the service
    async fn latest_version(&self) -> BridgeResult<ProtocolVersion>;

    /// Open a connection and return its event stream
    ///
    /// Dropping the stream tears the connection down.
    async fn connect(&self, options: ConnectOptions) -> BridgeResult<EventStream>;
}
