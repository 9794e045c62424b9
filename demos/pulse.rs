//! Pulses one light through red, green and blue.
//!
//! Reads the bridge address and credentials from `BRIDGE_HOST`, `BRIDGE_USER` and
//! `BRIDGE_CLIENT_KEY`; `BRIDGE_LIGHT` selects the light (default 1). Run with
//! `RUST_LOG=huestream=debug` to watch throttle and keepalive decisions.
use std::time::Duration;

use anyhow::Context;
use huestream::{ColorUpdate, EntertainmentClient, SessionEvent, StreamProfile};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = std::env::var("BRIDGE_HOST").context("BRIDGE_HOST not set")?;
    let user = std::env::var("BRIDGE_USER").context("BRIDGE_USER not set")?;
    let key = std::env::var("BRIDGE_CLIENT_KEY").context("BRIDGE_CLIENT_KEY not set")?;
    let light: u16 = std::env::var("BRIDGE_LIGHT")
        .ok()
        .map(|v| v.parse::<u16>())
        .transpose()
        .context("BRIDGE_LIGHT must be a light id")?
        .unwrap_or(1);

    let (client, mut events) = EntertainmentClient::new(StreamProfile::default().compile()?);
    client.connect(&host, &user, &key).await?;

    let watcher = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(?event, "session event");
            if event == SessionEvent::Closed {
                break;
            }
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_millis(20));
    for step in 0..750u32 {
        ticker.tick().await;
        let phase = (step % 150) as f32 / 150.0;
        let level = ((phase * std::f32::consts::TAU).sin() * 0.5 + 0.5) * 65535.0;
        let mut color = [0u16; 3];
        color[(step / 150 % 3) as usize] = level as u16;
        client.send_update(&[ColorUpdate::new(light, color)]).await;
        if !client.is_connected() {
            break;
        }
    }

    // idle long enough to watch keepalives hold the last color
    tokio::time::sleep(Duration::from_secs(5)).await;
    info!(stats = ?client.stats(), "finished streaming");
    client.close().await;
    watcher.await?;
    Ok(())
}
