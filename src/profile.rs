use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Remote UDP port of the bridge's entertainment endpoint.
pub const DEFAULT_STREAM_PORT: u16 = 2100;

/// Error produced when stream profile parameters fail validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("stream port must be non-zero")]
    ZeroPort,
    #[error("keepalive interval must be non-zero")]
    ZeroKeepaliveInterval,
    #[error("freshness window must be non-zero")]
    ZeroFreshnessWindow,
    #[error("at least one handshake retransmission is required")]
    NoRetransmissions,
    #[error("handshake flight interval must be non-zero")]
    ZeroFlightInterval,
}

/// Tunables for one streaming session.
///
/// Deserializable with every field optional so collaborators can embed it in
/// their own configuration; missing fields take the bridge defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamProfile {
    pub port: u16,
    pub keepalive_interval_ms: u64,
    pub freshness_window_ms: u64,
    pub handshake_retransmissions: u8,
    pub handshake_flight_interval_ms: u64,
}

impl Default for StreamProfile {
    fn default() -> Self {
        Self {
            port: DEFAULT_STREAM_PORT,
            keepalive_interval_ms: 1_000,
            freshness_window_ms: 2_000,
            handshake_retransmissions: 4,
            handshake_flight_interval_ms: 1_000,
        }
    }
}

impl StreamProfile {
    /// Validates the profile into an immutable runtime configuration.
    pub fn compile(self) -> Result<CompiledStreamProfile, ProfileError> {
        if self.port == 0 {
            return Err(ProfileError::ZeroPort);
        }
        if self.keepalive_interval_ms == 0 {
            return Err(ProfileError::ZeroKeepaliveInterval);
        }
        if self.freshness_window_ms == 0 {
            return Err(ProfileError::ZeroFreshnessWindow);
        }
        if self.handshake_retransmissions == 0 {
            return Err(ProfileError::NoRetransmissions);
        }
        if self.handshake_flight_interval_ms == 0 {
            return Err(ProfileError::ZeroFlightInterval);
        }

        Ok(CompiledStreamProfile {
            port: self.port,
            keepalive_interval: Duration::from_millis(self.keepalive_interval_ms),
            freshness_window: Duration::from_millis(self.freshness_window_ms),
            handshake_retransmissions: self.handshake_retransmissions,
            handshake_flight_interval: Duration::from_millis(self.handshake_flight_interval_ms),
        })
    }
}

/// Validated stream profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStreamProfile {
    port: u16,
    keepalive_interval: Duration,
    freshness_window: Duration,
    handshake_retransmissions: u8,
    handshake_flight_interval: Duration,
}

impl CompiledStreamProfile {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Period of the keepalive task.
    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    /// Age after which the last accepted batch is retransmitted.
    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    pub fn handshake_retransmissions(&self) -> u8 {
        self.handshake_retransmissions
    }

    pub fn handshake_flight_interval(&self) -> Duration {
        self.handshake_flight_interval
    }

    /// Total time the handshake may take: the initial flight plus every retransmission.
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_flight_interval * (u32::from(self.handshake_retransmissions) + 1)
    }
}

impl Default for CompiledStreamProfile {
    fn default() -> Self {
        Self {
            port: DEFAULT_STREAM_PORT,
            keepalive_interval: Duration::from_secs(1),
            freshness_window: Duration::from_secs(2),
            handshake_retransmissions: 4,
            handshake_flight_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bridge_contract() {
        let compiled = StreamProfile::default().compile().unwrap();
        assert_eq!(compiled, CompiledStreamProfile::default());
        assert_eq!(compiled.port(), 2100);
        assert_eq!(compiled.keepalive_interval(), Duration::from_secs(1));
        assert_eq!(compiled.freshness_window(), Duration::from_secs(2));
        assert_eq!(compiled.handshake_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_degenerate_values() {
        let cases = [
            (StreamProfile { port: 0, ..Default::default() }, ProfileError::ZeroPort),
            (
                StreamProfile { keepalive_interval_ms: 0, ..Default::default() },
                ProfileError::ZeroKeepaliveInterval,
            ),
            (
                StreamProfile { freshness_window_ms: 0, ..Default::default() },
                ProfileError::ZeroFreshnessWindow,
            ),
            (
                StreamProfile { handshake_retransmissions: 0, ..Default::default() },
                ProfileError::NoRetransmissions,
            ),
            (
                StreamProfile { handshake_flight_interval_ms: 0, ..Default::default() },
                ProfileError::ZeroFlightInterval,
            ),
        ];
        for (profile, expected) in cases {
            assert_eq!(profile.compile().unwrap_err(), expected);
        }
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let profile: StreamProfile =
            serde_json::from_str(r#"{"port": 2200, "handshake_retransmissions": 2}"#).unwrap();
        assert_eq!(profile.port, 2200);
        assert_eq!(profile.handshake_retransmissions, 2);
        assert_eq!(profile.freshness_window_ms, 2_000);
        let compiled = profile.compile().unwrap();
        assert_eq!(compiled.handshake_timeout(), Duration::from_secs(3));
    }
}
