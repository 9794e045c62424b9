//! Entertainment streaming session controller.
//!
//! Streams per-light RGB state to a bridge over DTLS 1.2 with a pre-shared key.
//! Updates pass through a 2:1 decimating throttle and are encoded into the fixed
//! `HueStream` frame layout; a keepalive task resends the last accepted frame so
//! the bridge never sees the stream go silent while the session is healthy.

pub mod e2e_common;
pub mod handshake;
pub mod messages;
pub mod profile;
pub mod sdk;
pub mod session;
pub mod stream;

pub use handshake::{ConnectionError, PskCredentials, TransportError};
pub use messages::{ColorUpdate, LightId};
pub use profile::{CompiledStreamProfile, StreamProfile};
pub use sdk::EntertainmentClient;
pub use session::{SecureSession, SessionEvent, SessionEvents};
pub use stream::frame::{decode, encode, FrameError};
pub use stream::{LightStream, StreamStats};
