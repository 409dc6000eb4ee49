//! Length-prefixed framing for device command payloads
//!
//! A logical message is split over one or more frames no larger than the
//! transport unit. Every frame starts with a 4-byte header:
//!
//! | byte | meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | `(subtype << 2) \| maintype`                         |
//! | 1    | `16` when more frames follow, `0` on the last frame |
//! | 2    | sequence number                                     |
//! | 3    | chunk length (+4 when more frames follow)           |
//!
//! Frames that are followed by another frame carry the total message length
//! (low byte, high byte) right after the header, so a receiver learns the full
//! size from the first frame. Frames travel as lowercase hex text.

use thiserror::Error;

/// Maintype for data messages
pub const MAINTYPE_DATA: u8 = 1;
/// Subtype for custom device commands
pub const SUBTYPE_CUSTOM: u8 = 19;
/// Transport unit used by the LetPot broker
pub const DEFAULT_MTU: usize = 128;
/// Bytes of each transport unit reserved for framing
pub const HEADER_ROOM: usize = 6;
/// Smallest MTU that still carries one payload byte
pub const MIN_MTU: usize = HEADER_ROOM + 1;
/// Largest MTU whose continuation length byte (chunk + 4) fits in a byte
pub const MAX_MTU: usize = 255 - CONTINUATION_LENGTH_BIAS + HEADER_ROOM;

const CONTINUATION_FLAG: u8 = 16;
const CONTINUATION_LENGTH_BIAS: usize = 4;
const HEADER_LEN: usize = 4;
const TOTAL_LENGTH_LEN: usize = 2;

/// Framing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("MTU {0} cannot carry a frame (expected 7..=257)")]
    InvalidMtu(usize),
    #[error("Message type {maintype}/{subtype} does not fit the header byte")]
    InvalidMessageType { maintype: u8, subtype: u8 },
    #[error("Payload of {0} bytes exceeds the 65535 byte limit")]
    PayloadTooLarge(usize),
    #[error("Frame is not valid hex")]
    InvalidHex,
    #[error("Frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Serializes messages into frames, numbering every frame it emits
///
/// The sequence number belongs to a single connection: callers reset it when a
/// new connection is established.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    mtu: usize,
    sequence: u8,
}

impl FrameEncoder {
    pub fn new(mtu: usize) -> Result<Self, FrameError> {
        if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
            return Err(FrameError::InvalidMtu(mtu));
        }
        Ok(Self { mtu, sequence: 0 })
    }

    /// Largest payload chunk carried by one frame
    pub fn max_chunk(&self) -> usize {
        self.mtu - HEADER_ROOM
    }

    /// Sequence number the next frame will carry
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Restart numbering for a new connection
    pub fn reset(&mut self) {
        self.sequence = 0;
    }

    /// Number of frames needed for a payload of `len` bytes
    pub fn frame_count(&self, len: usize) -> usize {
        len.div_ceil(self.max_chunk()).max(1)
    }

    /// Encode a message into raw frames
    pub fn encode_frames(
        &mut self,
        maintype: u8,
        subtype: u8,
        payload: &[u8],
    ) -> Result<Vec<Vec<u8>>, FrameError> {
        if maintype > 0b11 || subtype > 0b11_1111 {
            return Err(FrameError::InvalidMessageType { maintype, subtype });
        }
        if payload.len() > u16::MAX as usize {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }

        let header = (subtype << 2) | maintype;
        let total = payload.len();
        let count = self.frame_count(total);
        let max_chunk = self.max_chunk();

        let mut frames = Vec::with_capacity(count);
        for index in 0..count {
            let start = index * max_chunk;
            let end = (start + max_chunk).min(total);
            let chunk = &payload[start..end];

            let mut frame = Vec::with_capacity(HEADER_LEN + TOTAL_LENGTH_LEN + chunk.len());
            if index + 1 < count {
                frame.extend_from_slice(&[
                    header,
                    CONTINUATION_FLAG,
                    self.sequence,
                    (chunk.len() + CONTINUATION_LENGTH_BIAS) as u8,
                    (total % 256) as u8,
                    (total / 256) as u8,
                ]);
            } else {
                frame.extend_from_slice(&[header, 0, self.sequence, chunk.len() as u8]);
            }
            frame.extend_from_slice(chunk);

            frames.push(frame);
            self.sequence = self.sequence.wrapping_add(1);
        }

        Ok(frames)
    }

    /// Encode a message into hex frames ready for publishing
    pub fn encode(
        &mut self,
        maintype: u8,
        subtype: u8,
        payload: &[u8],
    ) -> Result<Vec<String>, FrameError> {
        Ok(self
            .encode_frames(maintype, subtype, payload)?
            .iter()
            .map(hex::encode)
            .collect())
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            sequence: 0,
        }
    }
}

/// A single decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub maintype: u8,
    pub subtype: u8,
    pub continuation: bool,
    pub sequence: u8,
    /// Total message length, present on frames followed by another frame
    pub total_length: Option<u16>,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Decode one frame from raw bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let continuation = bytes[1] & CONTINUATION_FLAG != 0;
        let declared = bytes[3] as usize;
        let (body_start, chunk_len) = if continuation {
            let chunk_len = declared.checked_sub(CONTINUATION_LENGTH_BIAS).ok_or(
                FrameError::Truncated {
                    expected: HEADER_LEN + TOTAL_LENGTH_LEN,
                    actual: bytes.len(),
                },
            )?;
            (HEADER_LEN + TOTAL_LENGTH_LEN, chunk_len)
        } else {
            (HEADER_LEN, declared)
        };

        let expected = body_start + chunk_len;
        if bytes.len() < expected {
            return Err(FrameError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }

        let total_length =
            continuation.then(|| u16::from(bytes[4]) | (u16::from(bytes[5]) << 8));
        let payload = bytes[body_start..expected].to_vec();

        Ok(Self {
            maintype: bytes[0] & 0b11,
            subtype: bytes[0] >> 2,
            continuation,
            sequence: bytes[2],
            total_length,
            payload,
        })
    }

    /// Decode one frame from its hex text form
    pub fn from_hex(text: &[u8]) -> Result<Self, FrameError> {
        let bytes = hex::decode(text).map_err(|_| FrameError::InvalidHex)?;
        Self::parse(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_layout() {
        let mut encoder = FrameEncoder::default();
        let frames = encoder
            .encode(MAINTYPE_DATA, SUBTYPE_CUSTOM, &[97, 1])
            .unwrap();

        // (19 << 2) | 1 = 77 = 0x4d
        assert_eq!(frames, vec!["4d0000026101".to_string()]);
        assert_eq!(encoder.sequence(), 1);
    }

    #[test]
    fn test_continuation_frame_layout() {
        let mut encoder = FrameEncoder::new(10).unwrap();
        let payload: Vec<u8> = (1..=6).collect();

        let frames = encoder
            .encode_frames(MAINTYPE_DATA, SUBTYPE_CUSTOM, &payload)
            .unwrap();

        // max chunk is 4: [1,2,3,4] then [5,6]
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![77, 16, 0, 8, 6, 0, 1, 2, 3, 4]);
        assert_eq!(frames[1], vec![77, 0, 1, 2, 5, 6]);
    }

    #[test]
    fn test_total_length_split_over_two_bytes() {
        let mut encoder = FrameEncoder::default();
        let payload = vec![0xAB; 300];

        let frames = encoder
            .encode_frames(MAINTYPE_DATA, SUBTYPE_CUSTOM, &payload)
            .unwrap();

        assert_eq!(frames.len(), 3);
        for frame in &frames[..2] {
            assert_eq!(frame[1], 16);
            assert_eq!(frame[3] as usize, 122 + 4);
            assert_eq!(frame[4], (300 % 256) as u8);
            assert_eq!(frame[5], (300 / 256) as u8);
        }
        assert_eq!(frames[2][1], 0);
        assert_eq!(frames[2][3], 56);
    }

    #[test]
    fn test_sequence_continues_across_messages() {
        let mut encoder = FrameEncoder::default();
        encoder.encode(MAINTYPE_DATA, SUBTYPE_CUSTOM, &[1]).unwrap();
        encoder
            .encode(MAINTYPE_DATA, SUBTYPE_CUSTOM, &vec![0; 200])
            .unwrap();
        assert_eq!(encoder.sequence(), 3);

        encoder.reset();
        assert_eq!(encoder.sequence(), 0);
    }

    #[test]
    fn test_empty_payload_yields_one_empty_frame() {
        let mut encoder = FrameEncoder::default();
        let frames = encoder
            .encode_frames(MAINTYPE_DATA, SUBTYPE_CUSTOM, &[])
            .unwrap();
        assert_eq!(frames, vec![vec![77, 0, 0, 0]]);
    }

    #[test]
    fn test_invalid_mtu() {
        assert_eq!(FrameEncoder::new(6).unwrap_err(), FrameError::InvalidMtu(6));
        assert_eq!(
            FrameEncoder::new(258).unwrap_err(),
            FrameError::InvalidMtu(258)
        );
        assert!(FrameEncoder::new(7).is_ok());
        assert!(FrameEncoder::new(257).is_ok());
    }

    #[test]
    fn test_largest_mtu_length_byte_fits() {
        let mut encoder = FrameEncoder::new(257).unwrap();
        let frames = encoder
            .encode_frames(MAINTYPE_DATA, SUBTYPE_CUSTOM, &vec![1; 600])
            .unwrap();
        assert_eq!(frames[0][3], 255);
    }

    #[test]
    fn test_invalid_message_type() {
        let mut encoder = FrameEncoder::default();
        assert!(matches!(
            encoder.encode(4, 1, &[1]),
            Err(FrameError::InvalidMessageType { .. })
        ));
        assert!(matches!(
            encoder.encode(1, 64, &[1]),
            Err(FrameError::InvalidMessageType { .. })
        ));
        // failed encodes do not consume sequence numbers
        assert_eq!(encoder.sequence(), 0);
    }

    #[test]
    fn test_payload_too_large() {
        let mut encoder = FrameEncoder::default();
        let payload = vec![0; u16::MAX as usize + 1];
        assert_eq!(
            encoder.encode(MAINTYPE_DATA, SUBTYPE_CUSTOM, &payload),
            Err(FrameError::PayloadTooLarge(65536))
        );
    }

    #[test]
    fn test_sequence_wraps_after_255() {
        let mut encoder = FrameEncoder::default();
        for _ in 0..256 {
            encoder.encode(MAINTYPE_DATA, SUBTYPE_CUSTOM, &[0]).unwrap();
        }
        assert_eq!(encoder.sequence(), 0);
    }

    #[test]
    fn test_parse_final_frame() {
        let frame = Frame::from_hex(b"4d0005026101").unwrap();
        assert_eq!(frame.maintype, MAINTYPE_DATA);
        assert_eq!(frame.subtype, SUBTYPE_CUSTOM);
        assert!(!frame.continuation);
        assert_eq!(frame.sequence, 5);
        assert_eq!(frame.total_length, None);
        assert_eq!(frame.payload, vec![97, 1]);
    }

    #[test]
    fn test_parse_continuation_frame() {
        let frame = Frame::parse(&[77, 16, 0, 8, 6, 0, 1, 2, 3, 4]).unwrap();
        assert!(frame.continuation);
        assert_eq!(frame.total_length, Some(6));
        assert_eq!(frame.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_rejects_truncated_and_invalid_input() {
        assert!(matches!(
            Frame::parse(&[77, 0, 0]),
            Err(FrameError::Truncated { .. })
        ));
        assert!(matches!(
            Frame::parse(&[77, 0, 0, 5, 1]),
            Err(FrameError::Truncated { .. })
        ));
        assert_eq!(Frame::from_hex(b"zz"), Err(FrameError::InvalidHex));
    }
}
