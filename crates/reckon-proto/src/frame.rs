//! Frame codec.
//!
//! Every message on a connection is one frame: a fixed 12-byte header
//! followed by a CBOR payload.
//!
//! ```text
//!  0      2         3      4              8              12
//!  +------+---------+------+--------------+--------------+-------------
//!  | "RK" | version | kind | payload len  | call id      | payload ...
//!  +------+---------+------+--------------+--------------+-------------
//!                           (u32 BE)       (u32 BE)
//! ```
//!
//! # Invariants
//!
//! - The header is read and validated before any payload byte is trusted.
//! - Payloads larger than [`MAX_PAYLOAD_SIZE`] are rejected at the header.
//! - A response carries the call id of the request it answers.

use bytes::{BufMut, Bytes};
use serde::{Serialize, de::DeserializeOwned};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::big_endian::U32,
};

use crate::message::{Envelope, Reply};

/// Frame magic.
pub const MAGIC: [u8; 2] = *b"RK";

/// Current protocol version.
pub const VERSION: u8 = 1;

/// Largest accepted payload (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1 << 20;

/// Frame direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Client to server, payload is an [`Envelope`].
    Request = 1,
    /// Server to client, payload is a [`Reply`].
    Response = 2,
}

impl FrameKind {
    /// Decode the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Request),
            2 => Some(Self::Response),
            _ => None,
        }
    }
}

/// Errors from framing and payload (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Header does not start with [`MAGIC`].
    #[error("invalid magic: {0:02x?}")]
    InvalidMagic([u8; 2]),

    /// Header version is not [`VERSION`].
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Header kind byte is unknown.
    #[error("unknown frame kind: {0}")]
    UnknownKind(u8),

    /// Fewer bytes than the header announces.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Payload exceeds [`MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Announced or actual payload size.
        size: usize,
        /// Limit.
        max: usize,
    },

    /// Frame kind differs from what the reader expected.
    #[error("unexpected frame kind: expected {expected:?}, got {actual:?}")]
    UnexpectedKind {
        /// Kind the reader wanted.
        expected: FrameKind,
        /// Kind found in the header.
        actual: FrameKind,
    },

    /// Payload could not be serialized.
    #[error("payload encode failed: {0}")]
    Encode(String),

    /// Payload could not be deserialized.
    #[error("payload decode failed: {0}")]
    Decode(String),
}

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    magic: [u8; 2],
    version: u8,
    kind: u8,
    payload_size: U32,
    call_id: U32,
}

const _: () = assert!(std::mem::size_of::<FrameHeader>() == FrameHeader::SIZE);

impl FrameHeader {
    /// Encoded header size in bytes.
    pub const SIZE: usize = 12;

    /// Header for a frame of `kind` answering or issuing `call_id`.
    pub fn new(kind: FrameKind, call_id: u32, payload_size: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            kind: kind as u8,
            payload_size: U32::new(payload_size),
            call_id: U32::new(call_id),
        }
    }

    /// Parse and validate a header from the first [`Self::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let raw = bytes
            .get(..Self::SIZE)
            .ok_or(FrameError::Truncated { expected: Self::SIZE, actual: bytes.len() })?;
        let header = Self::read_from_bytes(raw)
            .map_err(|_| FrameError::Truncated { expected: Self::SIZE, actual: raw.len() })?;

        if header.magic != MAGIC {
            return Err(FrameError::InvalidMagic(header.magic));
        }
        if header.version != VERSION {
            return Err(FrameError::UnsupportedVersion(header.version));
        }
        if FrameKind::from_u8(header.kind).is_none() {
            return Err(FrameError::UnknownKind(header.kind));
        }
        let size = header.payload_size();
        if size > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge { size, max: MAX_PAYLOAD_SIZE });
        }

        Ok(header)
    }

    /// Frame direction. Validated headers always have a known kind.
    pub fn kind(&self) -> FrameKind {
        FrameKind::from_u8(self.kind).unwrap_or(FrameKind::Request)
    }

    /// Payload length announced by the header.
    pub fn payload_size(&self) -> usize {
        self.payload_size.get() as usize
    }

    /// Call id used to pair requests and responses.
    pub fn call_id(&self) -> u32 {
        self.call_id.get()
    }
}

/// Header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Validated header.
    pub header: FrameHeader,
    /// CBOR payload.
    pub payload: Bytes,
}

impl Frame {
    /// Serialize `message` into a frame of `kind`.
    pub fn from_message<T: Serialize>(
        kind: FrameKind,
        call_id: u32,
        message: &T,
    ) -> Result<Self, FrameError> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(message, &mut payload)
            .map_err(|e| FrameError::Encode(e.to_string()))?;

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let size = u32::try_from(payload.len()).map_err(|e| FrameError::Encode(e.to_string()))?;
        Ok(Self { header: FrameHeader::new(kind, call_id, size), payload: Bytes::from(payload) })
    }

    /// Request frame carrying `envelope`.
    pub fn request(call_id: u32, envelope: &Envelope) -> Result<Self, FrameError> {
        Self::from_message(FrameKind::Request, call_id, envelope)
    }

    /// Response frame carrying `reply`.
    pub fn response(call_id: u32, reply: &Reply) -> Result<Self, FrameError> {
        Self::from_message(FrameKind::Response, call_id, reply)
    }

    /// Pair an already-validated header with its payload bytes.
    pub fn from_parts(header: FrameHeader, payload: Bytes) -> Result<Self, FrameError> {
        if payload.len() != header.payload_size() {
            return Err(FrameError::Truncated {
                expected: header.payload_size(),
                actual: payload.len(),
            });
        }
        Ok(Self { header, payload })
    }

    /// Decode a complete frame from `bytes`. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::from_bytes(bytes)?;
        let end = FrameHeader::SIZE + header.payload_size();
        let payload = bytes
            .get(FrameHeader::SIZE..end)
            .ok_or(FrameError::Truncated { expected: end, actual: bytes.len() })?;
        Ok(Self { header, payload: Bytes::copy_from_slice(payload) })
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(self.header.as_bytes());
        dst.put_slice(&self.payload);
    }

    /// Encoded frame as a fresh buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FrameHeader::SIZE + self.payload.len());
        self.encode(&mut buf);
        buf
    }

    /// Deserialize the payload, checking the frame kind first.
    pub fn decode_payload<T: DeserializeOwned>(&self, expected: FrameKind) -> Result<T, FrameError> {
        let actual = self.header.kind();
        if actual != expected {
            return Err(FrameError::UnexpectedKind { expected, actual });
        }
        ciborium::de::from_reader(&self.payload[..]).map_err(|e| FrameError::Decode(e.to_string()))
    }

    /// Decode the payload as a request envelope.
    pub fn envelope(&self) -> Result<Envelope, FrameError> {
        self.decode_payload(FrameKind::Request)
    }

    /// Decode the payload as a reply.
    pub fn reply(&self) -> Result<Reply, FrameError> {
        self.decode_payload(FrameKind::Response)
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::message::{Call, Fault};

    #[test]
    fn header_layout() {
        let header = FrameHeader::new(FrameKind::Request, 7, 4);
        assert_eq!(header.as_bytes(), hex!("524b 01 01 00000004 00000007"));
    }

    #[test]
    fn header_rejects_bad_magic() {
        let bytes = hex!("4b52 01 01 00000000 00000000");
        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(FrameError::InvalidMagic(_))));
    }

    #[test]
    fn header_rejects_unknown_version_and_kind() {
        let bytes = hex!("524b 02 01 00000000 00000000");
        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(FrameError::UnsupportedVersion(2))));

        let bytes = hex!("524b 01 09 00000000 00000000");
        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(FrameError::UnknownKind(9))));
    }

    #[test]
    fn header_rejects_oversized_payload() {
        let bytes = hex!("524b 01 01 00100001 00000000");
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(FrameError::PayloadTooLarge { size: 0x0010_0001, .. })
        ));
    }

    #[test]
    fn header_rejects_short_input() {
        assert!(matches!(
            FrameHeader::from_bytes(&[0x52, 0x4b]),
            Err(FrameError::Truncated { expected: 12, actual: 2 })
        ));
    }

    #[test]
    fn request_frame_roundtrip() {
        let envelope = Envelope::routed(Call::LogIn { username: "alice".to_string(), key: 5 });
        let frame = Frame::request(42, &envelope).expect("encode");

        let decoded = Frame::decode(&frame.to_vec()).expect("decode");
        assert_eq!(decoded.header.call_id(), 42);
        assert_eq!(decoded.envelope().expect("payload"), envelope);
    }

    #[test]
    fn reply_from_request_frame_is_rejected() {
        let frame = Frame::request(1, &Envelope::routed(Call::Fetch)).expect("encode");
        assert!(matches!(
            frame.reply(),
            Err(FrameError::UnexpectedKind { expected: FrameKind::Response, .. })
        ));
    }

    #[test]
    fn decode_detects_truncated_payload() {
        let frame = Frame::response(3, &Reply::Fault(Fault::protocol("x"))).expect("encode");
        let bytes = frame.to_vec();
        let result = Frame::decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(FrameError::Truncated { .. })));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Frame::decode(&bytes);
        }
    }
}
