use bytes::{Buf, BufMut, BytesMut};

use crate::envelope::Envelope;
use crate::error::{ProtocolError, Result};

/// Frame header: magic (2) + version (2) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "TE" (0x54 0x45).
pub const MAGIC: [u8; 2] = [0x54, 0x45];

/// Envelope wire format version written by this build.
pub const WIRE_VERSION: u16 = 1;

/// Default maximum payload size: 4 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 4 * 1024 * 1024;

/// Configuration for envelope framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireConfig {
    /// Maximum JSON body size in bytes. Default: 4 MiB.
    pub max_payload_size: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬──────────┬──────────────────┐
/// │ Magic (2B)   │ Version   │ Length   │ JSON body        │
/// │ 0x54 0x45    │ (2B LE)   │ (4B LE)  │ (Length bytes)   │
/// │ "TE"         │           │          │                  │
/// └──────────────┴───────────┴──────────┴──────────────────┘
/// ```
pub fn encode_frame(envelope: &Envelope, dst: &mut BytesMut, max_payload: usize) -> Result<()> {
    let body = serde_json::to_vec(envelope)?;
    let max = max_payload.min(u32::MAX as usize);
    if body.len() > max {
        return Err(ProtocolError::PayloadTooLarge {
            size: body.len(),
            max,
        });
    }

    dst.reserve(HEADER_SIZE + body.len());
    dst.put_slice(&MAGIC);
    dst.put_u16_le(WIRE_VERSION);
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(&body);
    Ok(())
}

/// Decode an envelope from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Envelope>> {
    let Some(body_len) = peek_header(src, max_payload)? else {
        return Ok(None);
    };

    let total = HEADER_SIZE + body_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len);
    let envelope = serde_json::from_slice(&body)?;
    Ok(Some(envelope))
}

/// Decode a buffer holding exactly one frame.
pub fn decode_exact(bytes: &[u8], max_payload: usize) -> Result<Envelope> {
    let mut buf = BytesMut::from(bytes);
    match decode_frame(&mut buf, max_payload)? {
        Some(envelope) if buf.is_empty() => Ok(envelope),
        Some(_) => Err(ProtocolError::TrailingBytes(buf.len())),
        None => {
            let needed = match peek_header(&buf, max_payload)? {
                Some(body_len) => HEADER_SIZE + body_len,
                None => HEADER_SIZE,
            };
            Err(ProtocolError::Incomplete {
                needed,
                available: bytes.len(),
            })
        }
    }
}

/// Validate the header and return the declared body length, or `None` if
/// the header itself is incomplete.
fn peek_header(src: &[u8], max_payload: usize) -> Result<Option<usize>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(ProtocolError::InvalidMagic);
    }

    let version = u16::from_le_bytes([src[2], src[3]]);
    if version != WIRE_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let body_len = u32::from_le_bytes([src[4], src[5], src[6], src[7]]) as usize;
    if body_len > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            size: body_len,
            max: max_payload,
        });
    }

    Ok(Some(body_len))
}

#[cfg(feature = "async")]
pub use self::codec::EnvelopeCodec;

#[cfg(feature = "async")]
mod codec {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use super::{decode_frame, encode_frame, WireConfig};
    use crate::envelope::Envelope;
    use crate::error::ProtocolError;

    /// `tokio_util` codec reading and writing framed envelopes.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct EnvelopeCodec {
        config: WireConfig,
    }

    impl EnvelopeCodec {
        pub fn new(config: WireConfig) -> Self {
            Self { config }
        }
    }

    impl Decoder for EnvelopeCodec {
        type Item = Envelope;
        type Error = ProtocolError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, ProtocolError> {
            decode_frame(src, self.config.max_payload_size)
        }
    }

    impl Encoder<Envelope> for EnvelopeCodec {
        type Error = ProtocolError;

        fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), ProtocolError> {
            encode_frame(&item, dst, self.config.max_payload_size)
        }
    }
}
