//! The outer frame: header, flag, length, payload.
//!
//! Every packet on both TCP and UDP uses the same 7-byte prefix:
//!
//! ```text
//!  0       2    3              7                     FullMsgLen
//!  ┌───────┬────┬──────────────┬─────────────────────┐
//!  │Header │Flag│  FullMsgLen  │       Payload       │
//!  │u16 BE │ u8 │   u32 LE     │ FullMsgLen - 7 bytes│
//!  └───────┴────┴──────────────┴─────────────────────┘
//! ```
//!
//! Yes, the header is big-endian and the length is little-endian. That is
//! the format deployed clients speak, so it is preserved exactly.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Codec, Flag, ProtocolError, WireCodec};

/// Size of the fixed frame prefix.
pub const HEADER_LEN: usize = 7;

/// Minimum bytes needed before header and flag can be read.
const MIN_PEEK: usize = 4;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// The packet category. Decides how the flag and payload are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Header {
    Ack = 0x0000,
    Echo = 0x0100,
    Hello = 0x0200,
    Data = 0x0300,
    Disconnecting = 0x0400,
    Rejected = 0xFFFF,
    ImHere = 0xAAAA,
}

impl Header {
    /// The raw on-wire value.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Header {
    type Error = ProtocolError;

    fn try_from(code: u16) -> Result<Self, ProtocolError> {
        match code {
            0x0000 => Ok(Self::Ack),
            0x0100 => Ok(Self::Echo),
            0x0200 => Ok(Self::Hello),
            0x0300 => Ok(Self::Data),
            0x0400 => Ok(Self::Disconnecting),
            0xFFFF => Ok(Self::Rejected),
            0xAAAA => Ok(Self::ImHere),
            other => Err(ProtocolError::UnknownHeader(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// One decoded frame.
///
/// The header is kept as its raw `u16` so that a frame with an unknown
/// header still decodes. Whether the header is *meaningful* is a dispatch
/// question, answered by [`Packet::kind`].
///
/// `payload` is a [`Bytes`], a reference-counted buffer, so cloning a
/// packet for a broadcast to N players doesn't copy the payload N times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: u16,
    pub flag: Flag,
    pub payload: Bytes,
}

impl Packet {
    /// Creates a packet from already-encoded payload bytes.
    pub fn new(header: Header, flag: Flag, payload: impl Into<Bytes>) -> Self {
        Self {
            header: header.code(),
            flag,
            payload: payload.into(),
        }
    }

    /// Creates a packet whose payload is `body` encoded with [`WireCodec`].
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if `body` can't be encoded.
    pub fn with_body<T: Serialize>(
        header: Header,
        flag: Flag,
        body: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(header, flag, WireCodec.encode(body)?))
    }

    /// Shorthand for a `Data` packet carrying `body`.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if `body` can't be encoded.
    pub fn data<T: Serialize>(flag: Flag, body: &T) -> Result<Self, ProtocolError> {
        Self::with_body(Header::Data, flag, body)
    }

    /// The header as a known [`Header`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownHeader`] if the raw value is not
    /// part of the catalog.
    pub fn kind(&self) -> Result<Header, ProtocolError> {
        Header::try_from(self.header)
    }

    /// Decodes the payload as `T`.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the payload doesn't match `T`'s shape.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        WireCodec.decode(&self.payload)
    }

    /// Total encoded size, prefix included.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Encodes the packet into a complete frame.
    ///
    /// `FullMsgLen` is written as the total frame length, prefix included,
    /// which is what [`Packet::decode`] checks against.
    ///
    /// # Errors
    /// Returns [`ProtocolError::LengthOverflow`] if the frame is too large
    /// for the 32-bit length field.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let total = self.wire_len();
        let full_len = u32::try_from(total).map_err(|_| ProtocolError::LengthOverflow(total))?;

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u16(self.header);
        buf.put_u8(self.flag.0);
        buf.put_u32_le(full_len);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Bytes after `FullMsgLen` are not part of this frame and are ignored.
    /// Use [`declared_len`] to find where the next frame starts.
    ///
    /// # Errors
    /// - [`ProtocolError::FrameTooShort`] if `buf` holds fewer than 4 bytes.
    /// - [`ProtocolError::FrameCorrupt`] if the length field is incomplete,
    ///   smaller than the prefix, or larger than `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < MIN_PEEK {
            return Err(ProtocolError::FrameTooShort { len: buf.len() });
        }
        let full_len = declared_len(buf).ok_or_else(|| {
            ProtocolError::FrameCorrupt(format!(
                "length field incomplete: only {} bytes",
                buf.len()
            ))
        })?;
        if full_len < HEADER_LEN {
            return Err(ProtocolError::FrameCorrupt(format!(
                "declared length {full_len} is shorter than the {HEADER_LEN}-byte prefix"
            )));
        }
        if full_len > buf.len() {
            return Err(ProtocolError::FrameCorrupt(format!(
                "declared length {full_len} exceeds {} received bytes",
                buf.len()
            )));
        }

        Ok(Self {
            header: u16::from_be_bytes([buf[0], buf[1]]),
            flag: Flag(buf[2]),
            payload: Bytes::copy_from_slice(&buf[HEADER_LEN..full_len]),
        })
    }
}

/// Reads the `FullMsgLen` field without validating it.
///
/// Returns `None` until the full 7-byte prefix is available. Stream
/// reassembly uses this to decide how many more bytes to wait for.
pub fn declared_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let len = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);
    usize::try_from(len).ok()
}

// =========================================================================
// Tests
// =========================================================================
