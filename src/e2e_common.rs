//! In-memory transport and connector used by unit and integration tests.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::handshake::{
    ConnectionError, Connector, DatagramTransport, PskCredentials, TransportError,
};
use crate::profile::CompiledStreamProfile;

#[derive(Default)]
struct RecordingInner {
    frames: Mutex<Vec<Vec<u8>>>,
    closed: CancellationToken,
    fault: CancellationToken,
    fail_sends: AtomicBool,
    close_calls: AtomicUsize,
}

/// Transport that records every sent datagram and never receives any.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<RecordingInner>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.inner.frames.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.inner.frames.lock().len()
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Makes the pending `recv` fail as if the remote side reset the link.
    pub fn inject_fault(&self) {
        self.inner.fault.cancel();
    }

    /// Makes every following `send` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatagramTransport for RecordingTransport {
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Io("injected send failure".into()));
        }
        self.inner.frames.lock().push(bytes.to_vec());
        Ok(())
    }

    async fn recv(&self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        tokio::select! {
            _ = self.inner.closed.cancelled() => Err(TransportError::Closed),
            _ = self.inner.fault.cancelled() => Err(TransportError::Io("injected fault".into())),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.closed.cancel();
        Ok(())
    }
}

/// How a [`RecordingConnector`] answers `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorBehavior {
    /// Hands out the shared recording transport.
    Succeed,
    /// Fails as if the bridge rejected the PSK.
    Fail,
    /// Never completes, like a bridge that stays silent.
    Hang,
}

/// Connector handing out one shared [`RecordingTransport`].
#[derive(Clone)]
pub struct RecordingConnector {
    behavior: ConnectorBehavior,
    transport: RecordingTransport,
    attempts: Arc<AtomicUsize>,
    last_peer: Arc<Mutex<Option<SocketAddr>>>,
    last_identity: Arc<Mutex<Option<String>>>,
}

impl RecordingConnector {
    pub fn new(behavior: ConnectorBehavior) -> Self {
        Self {
            behavior,
            transport: RecordingTransport::new(),
            attempts: Arc::new(AtomicUsize::new(0)),
            last_peer: Arc::new(Mutex::new(None)),
            last_identity: Arc::new(Mutex::new(None)),
        }
    }

    pub fn transport(&self) -> RecordingTransport {
        self.transport.clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn last_peer(&self) -> Option<SocketAddr> {
        *self.last_peer.lock()
    }

    pub fn last_identity(&self) -> Option<String> {
        self.last_identity.lock().clone()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(
        &self,
        peer: SocketAddr,
        credentials: &PskCredentials,
        _profile: &CompiledStreamProfile,
    ) -> Result<Arc<dyn DatagramTransport>, ConnectionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_peer.lock() = Some(peer);
        *self.last_identity.lock() = Some(credentials.identity().to_string());
        match self.behavior {
            ConnectorBehavior::Succeed => Ok(Arc::new(self.transport.clone())),
            ConnectorBehavior::Fail => Err(ConnectionError::Handshake("psk rejected".into())),
            ConnectorBehavior::Hang => std::future::pending().await,
        }
    }
}
