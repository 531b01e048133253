//! Wire-format definitions for segments.
//!
//! Every datagram exchanged between a [`crate::connection::Connection`] and
//! its peer is one [`Segment`].  This module owns:
//! - the on-wire binary layout (header fields, flags, payload),
//! - serialising a [`Segment`] into a byte buffer ready for transmission,
//! - parsing a raw byte slice back into a [`Segment`], with errors for
//!   malformed or truncated input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Flags     |                  Window (bytes)               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Window cont. |         Payload Length        |   Checksum    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Checksum cont.|                  Payload ...                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 17 bytes.
//! seq(4) + ack(4) + flags(1) + window(4) + payload_len(2) + checksum(2)
//!
//! The window field is a **byte count**, not a segment count, so it is four
//! bytes wide (a receive window may well exceed 65535 bytes).

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// Synchronise sequence numbers (handshake initiation).
    pub const SYN: u8 = 0b0000_0001;
    /// Acknowledgement field is valid.
    pub const ACK: u8 = 0b0000_0010;
    /// Finish — sender has no more data to send.
    pub const FIN: u8 = 0b0000_0100;
    /// Reset the connection.
    pub const RST: u8 = 0b0000_1000;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 17;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_WINDOW: usize = 9;
const OFF_PAYLOAD_LEN: usize = 13;
const OFF_CHECKSUM: usize = 15;

/// Fixed-size segment header.
///
/// Fields are in host byte order; [`Segment::encode`] converts to big-endian
/// on the wire and [`Segment::decode`] converts back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Sequence number of the first payload byte in this segment.
    pub seq: u32,
    /// Acknowledgement number (next expected sequence number from the peer).
    pub ack: u32,
    /// Bitmask of [`flags`] constants.
    pub flags: u8,
    /// Advertised receive-window size in bytes.
    pub window: u32,
}

/// A complete datagram: header + payload bytes.
///
/// `payload_len` and `checksum` do not appear here — both are derived from
/// the payload during [`encode`](Segment::encode) and validated during
/// [`decode`](Segment::decode), so they cannot drift out of sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub header: SegmentHeader,
    pub payload: Vec<u8>,
}

impl Segment {
    /// A payload-free segment with the given flags (SYN, ACK, FIN, ...).
    pub fn control(seq: u32, ack: u32, flags: u8, window: u32) -> Self {
        Self {
            header: SegmentHeader {
                seq,
                ack,
                flags,
                window,
            },
            payload: Vec::new(),
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    ///
    /// The payload-length and checksum fields are computed from the actual
    /// payload during encoding.
    pub fn encode(&self) -> Vec<u8> {
        let payload_len = self.payload.len();
        debug_assert!(payload_len <= u16::MAX as usize, "payload too large");
        let mut buf = vec![0u8; HEADER_LEN + payload_len];

        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_FLAGS] = self.header.flags;
        buf[OFF_WINDOW..OFF_WINDOW + 4].copy_from_slice(&self.header.window.to_be_bytes());
        buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2]
            .copy_from_slice(&(payload_len as u16).to_be_bytes());
        // Checksum field stays zero while the checksum is computed.
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        let csum = internet_checksum(&buf);
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());

        buf
    }

    /// Parse a [`Segment`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the payload-length field disagrees with `buf.len()`, or
    /// - the checksum does not verify.
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        if buf.len() < HEADER_LEN {
            return Err(SegmentError::Truncated);
        }

        let seq = u32::from_be_bytes(buf[OFF_SEQ..OFF_SEQ + 4].try_into().unwrap());
        let ack = u32::from_be_bytes(buf[OFF_ACK..OFF_ACK + 4].try_into().unwrap());
        let flags = buf[OFF_FLAGS];
        let window = u32::from_be_bytes(buf[OFF_WINDOW..OFF_WINDOW + 4].try_into().unwrap());
        let payload_len =
            u16::from_be_bytes(buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2].try_into().unwrap());
        let checksum =
            u16::from_be_bytes(buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].try_into().unwrap());

        if buf.len() != HEADER_LEN + payload_len as usize {
            return Err(SegmentError::LengthMismatch);
        }

        // Verify checksum: zero the stored field, recompute, compare.
        let mut scratch = buf.to_vec();
        scratch[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&0u16.to_be_bytes());
        if internet_checksum(&scratch) != checksum {
            return Err(SegmentError::ChecksumFailed);
        }

        Ok(Segment {
            header: SegmentHeader {
                seq,
                ack,
                flags,
                window,
            },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, PartialEq, Eq)]
pub enum SegmentError {
    /// Buffer shorter than the fixed header size.
    Truncated,
    /// Payload-length field does not match the actual remaining bytes.
    LengthMismatch,
    /// Checksum did not match the recomputed value.
    ChecksumFailed,
}

impl std::fmt::Display for SegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentError::Truncated => write!(f, "buffer too short to contain a header"),
            SegmentError::LengthMismatch => {
                write!(f, "payload-length field does not match remaining bytes")
            }
            SegmentError::ChecksumFailed => write!(f, "checksum verification failed"),
        }
    }
}

impl std::error::Error for SegmentError {}

/// One's-complement checksum over `data` per RFC 1071.
///
/// The buffer is read as big-endian 16-bit words (a lone trailing byte acts
/// as the high half of a final word), carries are folded back in, and the
/// result is inverted.  Any embedded checksum field must be zeroed by the
/// caller first.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut words = data.chunks_exact(2);
    let mut sum: u32 = words
        .by_ref()
        .map(|w| u32::from(u16::from_be_bytes([w[0], w[1]])))
        .sum();
    if let [tail] = words.remainder() {
        sum += u32::from(*tail) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_segment(seq: u32, ack: u32, flags: u8, window: u32, payload: &[u8]) -> Segment {
        Segment {
            header: SegmentHeader {
                seq,
                ack,
                flags,
                window,
            },
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let seg = make_segment(42, 0, flags::SYN, 4096, b"hello");
        let decoded = Segment::decode(&seg.encode()).unwrap();
        assert_eq!(decoded, seg);
    }

    #[test]
    fn window_wider_than_u16() {
        // Byte windows routinely exceed 65535; the field must carry them.
        let seg = make_segment(0, 0, flags::ACK, 1 << 20, b"");
        let decoded = Segment::decode(&seg.encode()).unwrap();
        assert_eq!(decoded.header.window, 1 << 20);
    }

    #[test]
    fn decode_rejects_anything_shorter_than_a_header() {
        for len in 0..HEADER_LEN {
            assert_eq!(
                Segment::decode(&vec![0u8; len]),
                Err(SegmentError::Truncated),
                "a {len}-byte buffer must not parse"
            );
        }
    }

    #[test]
    fn length_field_must_match_remaining_bytes() {
        let good = make_segment(0, 0, 0, 0, b"data").encode();

        let mut short = good.clone();
        short.pop();
        assert_eq!(Segment::decode(&short), Err(SegmentError::LengthMismatch));

        let mut long = good;
        long.push(0);
        assert_eq!(Segment::decode(&long), Err(SegmentError::LengthMismatch));
    }

    #[test]
    fn corruption_anywhere_fails_the_checksum() {
        let clean = make_segment(7, 3, flags::ACK, 512, b"payload").encode();
        // Header start, flags, window, first payload byte, last payload byte.
        for offset in [0, OFF_FLAGS, OFF_WINDOW, HEADER_LEN, clean.len() - 1] {
            let mut bytes = clean.clone();
            bytes[offset] ^= 0x40;
            assert_eq!(
                Segment::decode(&bytes),
                Err(SegmentError::ChecksumFailed),
                "bit flip at offset {offset} went undetected"
            );
        }
    }

    #[test]
    fn control_segment_has_no_payload() {
        let seg = Segment::control(7, 8, flags::SYN | flags::ACK, 2048);
        assert!(seg.payload.is_empty());
        let bytes = seg.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(bytes[OFF_FLAGS], flags::SYN | flags::ACK);
    }

    #[test]
    fn multibyte_fields_are_big_endian_on_wire() {
        let bytes = make_segment(0xAABB_CCDD, 0x1122_3344, 0, 0x0011_2233, b"").encode();
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 4], &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(&bytes[OFF_ACK..OFF_ACK + 4], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(&bytes[OFF_WINDOW..OFF_WINDOW + 4], &[0x00, 0x11, 0x22, 0x33]);
    }
}
