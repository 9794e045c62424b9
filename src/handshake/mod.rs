//! Encrypted datagram transport seam and the errors it surfaces.
//!
//! The production transport is DTLS 1.2 with a pre-shared key (see
//! [`transport::DtlsConnector`]). Everything above this module only sees the
//! [`DatagramTransport`] and [`Connector`] traits.
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::profile::CompiledStreamProfile;

pub mod transport;

/// Errors raised while establishing a session. Never retried internally.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid remote address {0:?}: expected an IPv4 or IPv6 literal")]
    InvalidAddress(String),
    #[error("invalid pre-shared key: {0}")]
    InvalidPsk(String),
    #[error("transport setup failed: {0}")]
    Transport(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("handshake gave up after {attempts} retransmissions")]
    RetransmissionsExhausted { attempts: u8 },
    #[error("session already used; build a new session to reconnect")]
    SessionConsumed,
    #[error("connect aborted by close")]
    Aborted,
}

/// I/O failure on an established session. Fatal to that session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io: {0}")]
    Io(String),
    #[error("transport closed")]
    Closed,
}

/// PSK identity plus decoded secret used for the handshake.
#[derive(Clone)]
pub struct PskCredentials {
    identity: String,
    secret: Vec<u8>,
}

impl PskCredentials {
    /// Decodes a hex client key for `identity`.
    pub fn from_hex(identity: &str, secret_hex: &str) -> Result<Self, ConnectionError> {
        if identity.is_empty() {
            return Err(ConnectionError::InvalidPsk("identity is empty".into()));
        }
        let secret = hex::decode(secret_hex.trim())
            .map_err(|e| ConnectionError::InvalidPsk(e.to_string()))?;
        if secret.is_empty() {
            return Err(ConnectionError::InvalidPsk("secret is empty".into()));
        }
        Ok(Self {
            identity: identity.to_string(),
            secret,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for PskCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskCredentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// An established, encrypted datagram link.
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Sends one datagram.
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Waits for the next inbound datagram. Errors once the link is gone.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Shuts the link down; resolves once the underlying socket is released.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds a [`DatagramTransport`] by completing a handshake with `peer`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        peer: SocketAddr,
        credentials: &PskCredentials,
        profile: &CompiledStreamProfile,
    ) -> Result<Arc<dyn DatagramTransport>, ConnectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hex_client_key() {
        let creds = PskCredentials::from_hex("user", "0A0b10ff").unwrap();
        assert_eq!(creds.identity(), "user");
        assert_eq!(creds.secret(), &[0x0A, 0x0B, 0x10, 0xFF]);
    }

    #[test]
    fn rejects_bad_credentials() {
        assert!(matches!(
            PskCredentials::from_hex("", "00"),
            Err(ConnectionError::InvalidPsk(_))
        ));
        assert!(matches!(
            PskCredentials::from_hex("user", "xyz"),
            Err(ConnectionError::InvalidPsk(_))
        ));
        assert!(matches!(
            PskCredentials::from_hex("user", ""),
            Err(ConnectionError::InvalidPsk(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let creds = PskCredentials::from_hex("user", "deadbeef").unwrap();
        let printed = format!("{:?}", creds);
        assert!(printed.contains("user"));
        assert!(!printed.contains("deadbeef"));
        assert!(!printed.contains("222"));
    }
}
