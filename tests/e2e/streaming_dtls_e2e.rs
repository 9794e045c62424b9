use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::timeout;
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::Config;
use webrtc_dtls::listener::listen;
use webrtc_util::conn::{Conn, Listener};

use huestream::session::state::SessionState;
use huestream::{decode, ColorUpdate, EntertainmentClient, SessionEvent, StreamProfile};

const USER: &str = "e2e-user";
const KEY_HEX: &str = "00112233445566778899aabbccddeeff";

fn bridge_config(seen_identity: Arc<Mutex<Vec<u8>>>) -> anyhow::Result<Config> {
    let key = hex::decode(KEY_HEX)?;
    Ok(Config {
        psk: Some(Arc::new(
            move |identity: &[u8]| -> Result<Vec<u8>, webrtc_dtls::Error> {
                *seen_identity.lock() = identity.to_vec();
                Ok(key.clone())
            },
        )),
        psk_identity_hint: Some(b"bridge".to_vec()),
        cipher_suites: vec![CipherSuiteId::Tls_Psk_With_Aes_128_Gcm_Sha256],
        ..Default::default()
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streams_frames_over_dtls_psk() -> anyhow::Result<()> {
    let seen_identity = Arc::new(Mutex::new(Vec::new()));
    let listener = listen("127.0.0.1:0", bridge_config(seen_identity.clone())?).await?;
    let bridge_addr = listener.addr().await?;

    let bridge = tokio::spawn(async move {
        let (conn, _peer) = listener.accept().await?;
        let mut buf = vec![0u8; 1500];
        let len = conn.recv(&mut buf).await?;
        buf.truncate(len);
        Ok::<_, anyhow::Error>(buf)
    });

    let profile = StreamProfile {
        port: bridge_addr.port(),
        handshake_flight_interval_ms: 500,
        ..Default::default()
    }
    .compile()?;
    let (client, mut events) = EntertainmentClient::new(profile);
    client.connect("127.0.0.1", USER, KEY_HEX).await?;
    assert_eq!(events.recv().await, Some(SessionEvent::Connected));

    let batch = vec![ColorUpdate::new(1, [0, 65535, 0])];
    client.send_update(&batch).await;

    let frame = timeout(Duration::from_secs(5), bridge).await???;
    assert_eq!(frame.len(), 25);
    assert_eq!(decode(&frame)?, batch);
    assert_eq!(seen_identity.lock().as_slice(), USER.as_bytes());

    client.close().await;
    assert_eq!(events.recv().await, Some(SessionEvent::Closed));
    assert_eq!(client.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_bridge_exhausts_handshake() -> anyhow::Result<()> {
    // bound but never answers
    let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await?;
    let profile = StreamProfile {
        port: silent.local_addr()?.port(),
        handshake_retransmissions: 2,
        handshake_flight_interval_ms: 100,
        ..Default::default()
    }
    .compile()?;
    let (client, mut events) = EntertainmentClient::new(profile);

    let result = timeout(Duration::from_secs(5), client.connect("127.0.0.1", USER, KEY_HEX)).await?;
    assert!(matches!(
        result,
        Err(huestream::ConnectionError::RetransmissionsExhausted { attempts: 2 })
    ));
    assert_eq!(events.recv().await, Some(SessionEvent::Closed));
    assert!(!client.is_connected());
    Ok(())
}
