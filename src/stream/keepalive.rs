//! Keepalive task that keeps the bridge from timing out an idle stream.
//!
//! The bridge drops back to its default lighting once packets stop arriving, so
//! while the caller is quiet the last accepted batch is resent on every tick
//! after it goes stale. Keepalive frames go straight to the session and never
//! pass through the throttle.
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::session::SecureSession;
use crate::stream::LightStream;

/// Spawns the keepalive loop for `session`.
///
/// The task ends on its own once the session starts tearing down; aborting the
/// returned handle stops it earlier.
pub fn spawn_keepalive(
    session: SecureSession,
    stream: LightStream,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let shutdown = session.shutdown_token();
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Some(frame) = stream.keepalive_frame(Instant::now()) {
                session.send(&frame).await;
            }
        }
        debug!("keepalive stopped");
    })
}
