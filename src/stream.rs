use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::messages::ColorUpdate;

pub mod frame;
pub mod keepalive;
pub mod throttle;

use throttle::UpdateThrottle;

/// The most recent batch that passed the throttle, with the instant it did.
#[derive(Debug, Clone, PartialEq)]
pub struct LastAccepted {
    pub batch: Vec<ColorUpdate>,
    pub accepted_at: Instant,
}

/// Counters for frames handed to the secure session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Batches admitted by the throttle and transmitted.
    pub admitted: u64,
    /// Batches dropped by the throttle.
    pub suppressed: u64,
    /// Keepalive retransmissions of the last accepted batch.
    pub keepalives: u64,
}

#[derive(Debug, Default)]
struct StreamState {
    throttle: UpdateThrottle,
    last_accepted: Option<LastAccepted>,
    stats: StreamStats,
}

/// Throttle and last-accepted bookkeeping shared by the update path and the
/// keepalive task.
///
/// # Guarantees
/// * Throttle decisions and the last-accepted record change under a single lock,
///   so the keepalive never observes a half-applied update.
/// * Only admitted batches refresh `accepted_at`; keepalive frames never do.
#[derive(Debug, Clone)]
pub struct LightStream {
    state: Arc<Mutex<StreamState>>,
    freshness: Duration,
}

impl LightStream {
    /// Builds a stream whose keepalive fires once the last accepted batch is at
    /// least `freshness` old.
    pub fn new(freshness: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(StreamState::default())),
            freshness,
        }
    }

    /// Runs a batch through the throttle and returns the frame to transmit, if any.
    pub fn offer(&self, batch: &[ColorUpdate], now: Instant) -> Option<Vec<u8>> {
        {
            let mut state = self.state.lock();
            if !state.throttle.admit() {
                state.stats.suppressed += 1;
                debug!(entries = batch.len(), "update suppressed by throttle");
                return None;
            }
            state.last_accepted = Some(LastAccepted {
                batch: batch.to_vec(),
                accepted_at: now,
            });
            state.stats.admitted += 1;
        }
        let bytes = frame::encode(batch);
        trace!(entries = batch.len(), len = bytes.len(), "update admitted");
        Some(bytes)
    }

    /// Returns a retransmission of the last accepted batch when it has gone stale.
    pub fn keepalive_frame(&self, now: Instant) -> Option<Vec<u8>> {
        let batch = {
            let mut state = self.state.lock();
            let last = state.last_accepted.as_ref()?;
            let age = now.saturating_duration_since(last.accepted_at);
            if age < self.freshness {
                return None;
            }
            let batch = last.batch.clone();
            state.stats.keepalives += 1;
            debug!(age_ms = age.as_millis() as u64, "keepalive retransmission");
            batch
        };
        Some(frame::encode(&batch))
    }

    pub fn last_accepted(&self) -> Option<LastAccepted> {
        self.state.lock().last_accepted.clone()
    }

    pub fn stats(&self) -> StreamStats {
        self.state.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn green() -> Vec<ColorUpdate> {
        vec![ColorUpdate::new(1, [0, 65535, 0])]
    }

    #[test]
    fn only_admitted_batches_become_last_accepted() {
        let stream = LightStream::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert!(stream.offer(&green(), t0).is_some());

        let red = vec![ColorUpdate::new(1, [65535, 0, 0])];
        assert!(stream.offer(&red, t0 + Duration::from_millis(10)).is_none());

        let last = stream.last_accepted().unwrap();
        assert_eq!(last.batch, green());
        assert_eq!(last.accepted_at, t0);
        assert_eq!(
            stream.stats(),
            StreamStats {
                admitted: 1,
                suppressed: 1,
                keepalives: 0
            }
        );
    }

    #[test]
    fn keepalive_is_noop_before_first_update() {
        let stream = LightStream::new(Duration::from_secs(2));
        assert!(stream.keepalive_frame(Instant::now()).is_none());
    }

    #[test]
    fn keepalive_waits_for_freshness_window() {
        let stream = LightStream::new(Duration::from_secs(2));
        let t0 = Instant::now();
        let sent = stream.offer(&green(), t0).unwrap();

        assert!(stream.keepalive_frame(t0 + Duration::from_millis(1999)).is_none());
        assert_eq!(stream.keepalive_frame(t0 + Duration::from_secs(2)), Some(sent.clone()));
        assert_eq!(stream.keepalive_frame(t0 + Duration::from_secs(3)), Some(sent));
        // keepalives never refresh the timestamp
        assert_eq!(stream.last_accepted().unwrap().accepted_at, t0);
        assert_eq!(stream.stats().keepalives, 2);
    }

    #[test]
    fn fresh_admit_resets_staleness() {
        let stream = LightStream::new(Duration::from_secs(2));
        let t0 = Instant::now();
        stream.offer(&green(), t0);
        stream.offer(&green(), t0 + Duration::from_secs(1)); // suppressed
        let t2 = t0 + Duration::from_millis(1500);
        let blue = vec![ColorUpdate::new(1, [0, 0, 65535])];
        let sent = stream.offer(&blue, t2).unwrap();

        assert!(stream.keepalive_frame(t0 + Duration::from_secs(3)).is_none());
        assert_eq!(stream.keepalive_frame(t2 + Duration::from_secs(2)), Some(sent));
    }
}
