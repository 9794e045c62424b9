use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::handshake::transport::DtlsConnector;
use crate::handshake::{ConnectionError, Connector, PskCredentials};
use crate::messages::ColorUpdate;
use crate::profile::CompiledStreamProfile;
use crate::session::state::SessionState;
use crate::session::{SecureSession, SessionEvents};
use crate::stream::keepalive::spawn_keepalive;
use crate::stream::{LastAccepted, LightStream, StreamStats};

/// Streaming controller for one bridge: throttled updates, keepalive and lifecycle.
///
/// # Guarantees
/// * `send_update` never blocks on a queue; it drops instead.
/// * Keepalive frames bypass the throttle and never refresh the last-accepted timestamp.
/// * The keepalive task is stopped before the session is torn down.
/// * `close` is idempotent and the `Closed` notification fires exactly once.
pub struct EntertainmentClient {
    session: SecureSession,
    stream: LightStream,
    keepalive_handle: Mutex<Option<JoinHandle<()>>>,
}

impl EntertainmentClient {
    /// Builds a client that connects over DTLS.
    pub fn new(profile: CompiledStreamProfile) -> (Self, SessionEvents) {
        Self::with_connector(profile, Arc::new(DtlsConnector))
    }

    /// Builds a client on top of a custom [`Connector`].
    pub fn with_connector(
        profile: CompiledStreamProfile,
        connector: Arc<dyn Connector>,
    ) -> (Self, SessionEvents) {
        let stream = LightStream::new(profile.freshness_window());
        let (session, events) = SecureSession::new(profile, connector);
        let client = Self {
            session,
            stream,
            keepalive_handle: Mutex::new(None),
        };
        (client, events)
    }

    /// Opens the session to `host` and starts the keepalive.
    ///
    /// # Errors
    /// Returns [`ConnectionError::InvalidPsk`] for a malformed client key and otherwise
    /// whatever [`SecureSession::open`] reports. Nothing is retried.
    pub async fn connect(
        &self,
        host: &str,
        username: &str,
        psk_hex: &str,
    ) -> Result<(), ConnectionError> {
        let credentials = PskCredentials::from_hex(username, psk_hex)?;
        self.session.open(host, &credentials).await?;

        let handle = spawn_keepalive(
            self.session.clone(),
            self.stream.clone(),
            self.session.profile().keepalive_interval(),
        );
        if let Some(previous) = self.keepalive_handle.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Submits a batch. Dropped silently when not connected or when throttled.
    pub async fn send_update(&self, batch: &[ColorUpdate]) {
        if !self.session.is_connected() {
            return;
        }
        if let Some(frame) = self.stream.offer(batch, Instant::now()) {
            self.session.send(&frame).await;
        }
    }

    /// Stops the keepalive and closes the session.
    pub async fn close(&self) {
        if let Some(handle) = self.keepalive_handle.lock().take() {
            handle.abort();
        }
        self.session.close().await;
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn last_accepted(&self) -> Option<LastAccepted> {
        self.stream.last_accepted()
    }

    pub fn stats(&self) -> StreamStats {
        self.stream.stats()
    }
}
