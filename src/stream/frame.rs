//! Binary framing for entertainment stream packets.
//!
//! Every packet is a fixed 16-byte header followed by one 9-byte entry per
//! light. The header never changes: protocol version 1.0, sequence 0, RGB color
//! space. Entry order on the wire is exactly the order of the batch.
use thiserror::Error;

use crate::messages::ColorUpdate;

/// Protocol identifier at the start of every frame.
pub const PROTOCOL_MAGIC: &[u8; 9] = b"HueStream";
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;
pub const COLOR_SPACE_RGB: u8 = 0;
pub const ENTRY_TYPE_LIGHT: u8 = 0;

pub const HEADER_LEN: usize = 16;
pub const ENTRY_LEN: usize = 9;

/// Errors raised while parsing a received frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame shorter than header: {0} bytes")]
    TooShort(usize),
    #[error("protocol magic mismatch")]
    BadMagic,
    #[error("unsupported protocol version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("unsupported color space {0}")]
    UnsupportedColorSpace(u8),
    #[error("entry section of {0} bytes is not a whole number of entries")]
    Truncated(usize),
    #[error("unknown entry type {kind} at index {index}")]
    UnknownEntryType { index: usize, kind: u8 },
}

/// Returns the encoded size of a frame carrying `entries` lights.
pub const fn frame_len(entries: usize) -> usize {
    HEADER_LEN + ENTRY_LEN * entries
}

fn header() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..9].copy_from_slice(PROTOCOL_MAGIC);
    header[9] = VERSION_MAJOR;
    header[10] = VERSION_MINOR;
    // 11: sequence, 12..14: reserved
    header[14] = COLOR_SPACE_RGB;
    header
}

/// Encodes a batch into a stream frame.
pub fn encode(batch: &[ColorUpdate]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame_len(batch.len()));
    out.extend_from_slice(&header());
    for update in batch {
        out.push(ENTRY_TYPE_LIGHT);
        out.extend_from_slice(&update.light_id.to_be_bytes());
        for channel in update.color {
            out.extend_from_slice(&channel.to_be_bytes());
        }
    }
    out
}

/// Parses a frame back into its light entries, in wire order.
pub fn decode(bytes: &[u8]) -> Result<Vec<ColorUpdate>, FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::TooShort(bytes.len()));
    }
    if &bytes[..9] != PROTOCOL_MAGIC {
        return Err(FrameError::BadMagic);
    }
    if bytes[9] != VERSION_MAJOR || bytes[10] != VERSION_MINOR {
        return Err(FrameError::UnsupportedVersion {
            major: bytes[9],
            minor: bytes[10],
        });
    }
    if bytes[14] != COLOR_SPACE_RGB {
        return Err(FrameError::UnsupportedColorSpace(bytes[14]));
    }

    let body = &bytes[HEADER_LEN..];
    if body.len() % ENTRY_LEN != 0 {
        return Err(FrameError::Truncated(body.len()));
    }

    body.chunks_exact(ENTRY_LEN)
        .enumerate()
        .map(|(index, entry)| {
            if entry[0] != ENTRY_TYPE_LIGHT {
                return Err(FrameError::UnknownEntryType {
                    index,
                    kind: entry[0],
                });
            }
            let word = |at: usize| u16::from_be_bytes([entry[at], entry[at + 1]]);
            Ok(ColorUpdate::new(word(1), [word(3), word(5), word(7)]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_header() -> Vec<u8> {
        let mut h = b"HueStream".to_vec();
        h.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0]);
        h
    }

    #[test]
    fn empty_batch_is_bare_header() {
        let frame = encode(&[]);
        assert_eq!(frame, expected_header());
    }

    #[test]
    fn length_and_header_fixed_for_any_size() {
        for n in 0..40u16 {
            let batch: Vec<_> = (0..n).map(|i| ColorUpdate::new(i, [i, i, i])).collect();
            let frame = encode(&batch);
            assert_eq!(frame.len(), 16 + 9 * n as usize);
            assert_eq!(&frame[..HEADER_LEN], expected_header().as_slice());
        }
    }

    #[test]
    fn single_green_light() {
        let frame = encode(&[ColorUpdate::new(1, [0, 65535, 0])]);
        assert_eq!(frame.len(), 25);
        assert_eq!(&frame[16..], &[0, 0x00, 0x01, 0, 0, 0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn three_lights_layout() {
        let batch = [
            ColorUpdate::new(0x0A0B, [0x1111, 0x2222, 0xBEEF]),
            ColorUpdate::new(2, [0, 0, 0]),
            ColorUpdate::new(3, [9, 9, 9]),
        ];
        let frame = encode(&batch);
        assert_eq!(frame.len(), 43);
        assert_eq!(frame[16], ENTRY_TYPE_LIGHT);
        assert_eq!(&frame[17..19], &[0x0A, 0x0B]);
        assert_eq!(&frame[23..25], &[0xBE, 0xEF]);
        assert_eq!(frame[25], ENTRY_TYPE_LIGHT);
    }

    #[test]
    fn decode_recovers_order_and_duplicates() {
        let batch = vec![
            ColorUpdate::new(5, [1, 2, 3]),
            ColorUpdate::new(5, [4, 5, 6]),
            ColorUpdate::new(1, [65535, 0, 7]),
        ];
        assert_eq!(decode(&encode(&batch)).unwrap(), batch);
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        let mut frame = encode(&[ColorUpdate::new(1, [1, 1, 1])]);
        assert_eq!(decode(&frame[..10]), Err(FrameError::TooShort(10)));
        assert_eq!(decode(&frame[..20]), Err(FrameError::Truncated(4)));

        frame[16] = 3;
        assert_eq!(
            decode(&frame),
            Err(FrameError::UnknownEntryType { index: 0, kind: 3 })
        );

        frame[14] = 1;
        assert_eq!(decode(&frame), Err(FrameError::UnsupportedColorSpace(1)));

        frame[9] = 2;
        assert_eq!(
            decode(&frame),
            Err(FrameError::UnsupportedVersion { major: 2, minor: 0 })
        );

        frame[0] = b'X';
        assert_eq!(decode(&frame), Err(FrameError::BadMagic));
    }
}
