//! In-process messaging client for tests.
//!
//! Available behind the `test-util` feature or in `#[cfg(test)]` within
//! pairgate-bridge. Tests hold a clone of the `ScriptedClient` and push
//! events into whichever connection is currently open.

use crate::error::{BridgeError, BridgeResult};
use crate::event::{ClientEvent, ProtocolVersion};
use crate::{ConnectOptions, EventStream, MessagingClient, EVENT_BUFFER};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct Inner {
    connects: AtomicUsize,
    refuse: AtomicBool,
    sender: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    last_options: Mutex<Option<ConnectOptions>>,
}

/// Messaging client driven by the test
#[derive(Clone, Default)]
pub struct ScriptedClient {
    inner: Arc<Inner>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful `connect` calls so far
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Options passed to the most recent `connect`
    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.inner
            .last_options
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Deliver an event to the open connection
    ///
    /// Returns `false` if no connection is open.
    pub async fn emit(&self, event: ClientEvent) -> bool {
        let sender = self
            .inner
            .sender
            .lock()
            .ok()
            .and_then(|guard| guard.clone());

        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Close the open connection
    pub fn close(&self) {
        if let Ok(mut guard) = self.inner.sender.lock() {
            guard.take();
        }
    }
}

#[async_trait]
impl MessagingClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn latest_version(&self) -> BridgeResult<ProtocolVersion> {
        Ok(ProtocolVersion("2.3000.1".to_string()))
    }

    async fn connect(&self, options: ConnectOptions) -> BridgeResult<EventStream> {
        if self.inner.refuse.load(Ordering::SeqCst) {
            return Err(BridgeError::Refused("scripted refusal".to_string()));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        if let Ok(mut guard) = self.inner.sender.lock() {
            *guard = Some(tx);
        }
        if let Ok(mut guard) = self.inner.last_options.lock() {
            *guard = Some(options);
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }
}
