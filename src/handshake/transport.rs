use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, info};
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::Config;
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::conn::Conn;

use super::{ConnectionError, Connector, DatagramTransport, PskCredentials, TransportError};
use crate::profile::CompiledStreamProfile;

/// The only cipher suite offered to the bridge.
pub const PSK_CIPHER_SUITE: CipherSuiteId = CipherSuiteId::Tls_Psk_With_Aes_128_Gcm_Sha256;

/// DTLS-PSK client link over a connected UDP socket.
pub struct DtlsTransport {
    conn: Arc<dyn Conn + Send + Sync>,
    peer: SocketAddr,
}

impl DtlsTransport {
    /// Binds an ephemeral socket, connects it to `peer` and runs the client handshake.
    ///
    /// # Behavior
    /// * Offers only [`PSK_CIPHER_SUITE`]; the PSK identity is the credential identity.
    /// * Handshake flights are retransmitted every `handshake_flight_interval`; once the
    ///   configured number of retransmissions has elapsed without completion the attempt
    ///   fails with [`ConnectionError::RetransmissionsExhausted`].
    pub async fn connect(
        peer: SocketAddr,
        credentials: &PskCredentials,
        profile: &CompiledStreamProfile,
    ) -> Result<Self, ConnectionError> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        socket
            .connect(peer)
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        let secret = credentials.secret().to_vec();
        let config = Config {
            psk: Some(Arc::new(
                move |_hint: &[u8]| -> Result<Vec<u8>, webrtc_dtls::Error> { Ok(secret.clone()) },
            )),
            psk_identity_hint: Some(credentials.identity().as_bytes().to_vec()),
            cipher_suites: vec![PSK_CIPHER_SUITE],
            flight_interval: profile.handshake_flight_interval(),
            ..Default::default()
        };

        info!(%peer, identity = credentials.identity(), "starting DTLS handshake");
        let handshake = DTLSConn::new(Arc::new(socket), config, true, None);
        let conn = match time::timeout(profile.handshake_timeout(), handshake).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => return Err(ConnectionError::Handshake(err.to_string())),
            Err(_) => {
                return Err(ConnectionError::RetransmissionsExhausted {
                    attempts: profile.handshake_retransmissions(),
                })
            }
        };
        debug!(%peer, "DTLS handshake complete");

        Ok(Self {
            conn: Arc::new(conn),
            peer,
        })
    }
}

#[async_trait]
impl DatagramTransport for DtlsTransport {
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.conn
            .send(bytes)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Io(format!("send to {}: {}", self.peer, e)))
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.conn
            .recv(buf)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        debug!(peer = %self.peer, "closing DTLS transport");
        self.conn
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

/// Production [`Connector`] establishing [`DtlsTransport`] links.
#[derive(Debug, Default, Clone, Copy)]
pub struct DtlsConnector;

#[async_trait]
impl Connector for DtlsConnector {
    async fn connect(
        &self,
        peer: SocketAddr,
        credentials: &PskCredentials,
        profile: &CompiledStreamProfile,
    ) -> Result<Arc<dyn DatagramTransport>, ConnectionError> {
        let transport = DtlsTransport::connect(peer, credentials, profile).await?;
        Ok(Arc::new(transport))
    }
}
