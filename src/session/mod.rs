use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::handshake::{ConnectionError, Connector, DatagramTransport, PskCredentials};
use crate::profile::CompiledStreamProfile;

pub mod state;
use state::SessionState;

const MAX_INBOUND_DATAGRAM: usize = 1500;

/// Lifecycle notifications delivered to the session owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session is usable; emitted at most once.
    Connected,
    /// The session is fully torn down; emitted exactly once for any session that
    /// attempted to open.
    Closed,
}

/// Receiving end of a session's notifications.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

struct SessionInner {
    state: Mutex<SessionState>,
    transport: Mutex<Option<Arc<dyn DatagramTransport>>>,
    connector: Arc<dyn Connector>,
    profile: CompiledStreamProfile,
    shutdown: CancellationToken,
    torn_down: watch::Sender<bool>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// One encrypted datagram session to a fixed bridge.
///
/// # Guarantees
/// * `send` never queues: frames are dropped unless the session is connected.
/// * Every teardown path (caller close, close during the handshake, transport error)
///   converges on a single `Closed` notification. Dropping a pending `open` counts
///   as closing during the handshake.
/// * A session opens at most once; reconnecting means building a new session.
#[derive(Clone)]
pub struct SecureSession {
    inner: Arc<SessionInner>,
}

impl SecureSession {
    pub fn new(
        profile: CompiledStreamProfile,
        connector: Arc<dyn Connector>,
    ) -> (Self, SessionEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let (torn_down, _) = watch::channel(false);
        let session = Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::Disconnected),
                transport: Mutex::new(None),
                connector,
                profile,
                shutdown: CancellationToken::new(),
                torn_down,
                events,
            }),
        };
        (session, rx)
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().is_connected()
    }

    pub fn profile(&self) -> &CompiledStreamProfile {
        &self.inner.profile
    }

    /// Token cancelled as soon as teardown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Resolves `host` and completes the handshake.
    ///
    /// # Errors
    /// * [`ConnectionError::InvalidAddress`] when `host` is not an IP literal.
    /// * [`ConnectionError::SessionConsumed`] when the session already left `Disconnected`.
    /// * [`ConnectionError::Aborted`] when `close` ran while the handshake was in flight.
    /// * Whatever the connector reports for transport or handshake failures.
    pub async fn open(
        &self,
        host: &str,
        credentials: &PskCredentials,
    ) -> Result<(), ConnectionError> {
        let ip: IpAddr = host
            .trim()
            .parse()
            .map_err(|_| ConnectionError::InvalidAddress(host.to_string()))?;
        let peer = SocketAddr::new(ip, self.inner.profile.port());

        {
            let mut state = self.inner.state.lock();
            *state = state
                .transition(SessionState::Handshaking)
                .map_err(|_| ConnectionError::SessionConsumed)?;
        }
        info!(%peer, identity = credentials.identity(), "opening session");
        let mut guard = HandshakeGuard {
            session: self,
            armed: true,
        };

        let outcome = tokio::select! {
            res = self.inner.connector.connect(peer, credentials, &self.inner.profile) => res,
            _ = self.inner.shutdown.cancelled() => Err(ConnectionError::Aborted),
        };

        let transport = match outcome {
            Ok(transport) => transport,
            Err(err) => {
                warn!(%peer, %err, "session establishment failed");
                self.abandon_handshake(None).await;
                return Err(err);
            }
        };

        let promoted = {
            let mut state = self.inner.state.lock();
            let connected = SessionState::Connected {
                since: Instant::now(),
            };
            if advance(&mut state, connected) {
                *self.inner.transport.lock() = Some(transport.clone());
            }
            state.is_connected()
        };
        if !promoted {
            self.abandon_handshake(Some(transport)).await;
            return Err(ConnectionError::Aborted);
        }

        guard.armed = false;
        info!(%peer, "session connected");
        let _ = self.inner.events.send(SessionEvent::Connected);
        self.spawn_monitor(transport);
        Ok(())
    }

    /// Best-effort transmission; silently dropped unless connected.
    pub async fn send(&self, bytes: &[u8]) {
        let transport = {
            if !self.inner.state.lock().is_connected() {
                trace!(len = bytes.len(), "dropping frame; session not connected");
                return;
            }
            self.inner.transport.lock().clone()
        };
        let Some(transport) = transport else {
            return;
        };

        match transport.send(bytes).await {
            Ok(()) => trace!(len = bytes.len(), "frame sent"),
            Err(err) => {
                warn!(%err, "send failed; closing session");
                let session = self.clone();
                tokio::spawn(async move { session.close().await });
            }
        }
    }

    /// Tears the session down. Idempotent; resolves once the transport is released.
    pub async fn close(&self) {
        let transport = {
            let mut state = self.inner.state.lock();
            let current = state.clone();
            match current {
                SessionState::Disconnected | SessionState::Closed => return,
                SessionState::Closing => None,
                SessionState::Handshaking => {
                    // the pending open (or its guard) finishes the teardown
                    advance(&mut state, SessionState::Closing);
                    self.inner.shutdown.cancel();
                    None
                }
                SessionState::Connected { .. } => {
                    if !advance(&mut state, SessionState::Closing) {
                        return;
                    }
                    self.inner.shutdown.cancel();
                    Some(self.inner.transport.lock().take())
                }
            }
        };

        match transport {
            Some(transport) => self.release(transport).await,
            None => self.wait_torn_down().await,
        }
    }

    async fn abandon_handshake(&self, transport: Option<Arc<dyn DatagramTransport>>) {
        self.begin_teardown();
        self.release(transport).await;
    }

    async fn release(&self, transport: Option<Arc<dyn DatagramTransport>>) {
        if let Some(transport) = transport {
            if let Err(err) = transport.close().await {
                warn!(%err, "transport close reported an error");
            }
        }
        self.finish();
    }

    /// Moves a still-handshaking session to `Closing` and cancels its tasks.
    fn begin_teardown(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == SessionState::Handshaking {
                advance(&mut state, SessionState::Closing);
            }
        }
        self.inner.shutdown.cancel();
    }

    /// Final `Closing -> Closed` step; emits `Closed` only when the edge applies.
    fn finish(&self) {
        if !advance(&mut self.inner.state.lock(), SessionState::Closed) {
            return;
        }
        self.inner.torn_down.send_replace(true);
        info!("session closed");
        let _ = self.inner.events.send(SessionEvent::Closed);
    }

    async fn wait_torn_down(&self) {
        let mut rx = self.inner.torn_down.subscribe();
        loop {
            let done = *rx.borrow_and_update();
            if done || rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn spawn_monitor(&self, transport: Arc<dyn DatagramTransport>) {
        let session = self.clone();
        tokio::spawn(async move {
            let shutdown = session.shutdown_token();
            let mut buf = vec![0u8; MAX_INBOUND_DATAGRAM];
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    res = transport.recv(&mut buf) => match res {
                        Ok(len) => trace!(len, "ignoring inbound datagram"),
                        Err(_) if shutdown.is_cancelled() => return,
                        Err(err) => {
                            warn!(%err, "transport error; closing session");
                            break;
                        }
                    },
                }
            }
            session.close().await;
        });
    }
}

/// Applies `next` if the edge is legal; illegal edges are logged and ignored.
fn advance(state: &mut SessionState, next: SessionState) -> bool {
    match state.transition(next) {
        Ok(next) => {
            *state = next;
            true
        }
        Err(err) => {
            warn!(%err, "ignoring session transition");
            false
        }
    }
}

/// Finishes teardown when an `open` future is dropped before it settles.
struct HandshakeGuard<'a> {
    session: &'a SecureSession,
    armed: bool,
}

impl Drop for HandshakeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let pending = matches!(
            *self.session.inner.state.lock(),
            SessionState::Handshaking | SessionState::Closing
        );
        if pending {
            warn!("open abandoned mid-handshake; closing session");
            self.session.begin_teardown();
            self.session.finish();
        }
    }
}
