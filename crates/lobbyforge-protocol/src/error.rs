//! Error types for the protocol layer.
//!
//! Every way a frame or a payload can fail to encode or decode has its own
//! variant. Callers never see a panic from this crate: truncated input,
//! bad lengths and field kinds the wire format cannot express all come
//! back as a [`ProtocolError`].

use std::fmt::Display;

/// Errors that can occur while framing or (de)serializing a packet.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// Fewer than 4 bytes were available, so not even the header and flag
    /// could be read.
    #[error("frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    /// The frame's length field is missing, smaller than the fixed header,
    /// or larger than the bytes actually received.
    #[error("frame corrupt: {0}")]
    FrameCorrupt(String),

    /// The payload shape contains a field kind the wire format has no
    /// representation for (maps, options, unsigned bytes, enums, ...).
    ///
    /// This is a developer error: the message struct itself is wrong,
    /// not the bytes on the wire.
    #[error("unsupported field kind: {0}")]
    UnsupportedFieldKind(&'static str),

    /// The payload ended before a field could be fully read.
    #[error("payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A string or sequence length prefix was negative.
    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    /// A string or sequence is too long for its int32 length prefix.
    #[error("length {0} does not fit in an int32 prefix")]
    LengthOverflow(usize),

    /// A `String` field held bytes that are not valid UTF-8.
    ///
    /// Use [`WireBytes`](crate::WireBytes) for fields that carry arbitrary
    /// bytes.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// The raw header value is outside the known [`Header`](crate::Header)
    /// set.
    #[error("unknown header: {0:#06x}")]
    UnknownHeader(u16),

    /// Any other serde-level failure (e.g. a `Deserialize` impl rejecting
    /// a value).
    #[error("{0}")]
    Custom(String),
}

// ---------------------------------------------------------------------------
// serde integration
// ---------------------------------------------------------------------------

// serde requires the data format's error type to implement these two
// traits so that derived impls can report their own failures
// ("invalid length 2, expected struct Hello with 3 elements").

impl serde::ser::Error for ProtocolError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl serde::de::Error for ProtocolError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}
