//! Codec trait and the binary wire codec.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw payload
//! bytes. Game logic never touches the byte layout directly: it hands a
//! message struct to a [`Codec`] and gets bytes back, or the other way
//! around.
//!
//! [`WireCodec`] is the only implementation the server ships. It speaks
//! the tagless, field-order-driven format described in [`crate::wire`].

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::{ProtocolError, wire};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between threads (Tokio may run any
///   task on any worker thread).
/// - `'static` → the codec owns everything it needs, so it can live
///   inside long-running tasks.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means decoded values don't
/// borrow from the input buffer, so the read buffer can be reused as soon
/// as decoding returns.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into payload bytes.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the value contains a field kind the
    /// format cannot represent.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, ProtocolError>;

    /// Deserializes payload bytes back into a value.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the bytes are truncated, carry a bad
    /// length prefix, or don't match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// WireCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for the game's binary payload format.
///
/// ## Example
///
/// ```rust
/// use lobbyforge_protocol::{Codec, Hello, WireCodec};
///
/// let codec = WireCodec;
/// let hello = Hello {
///     name: "Alice".into(),
///     identity: "s1".into(),
///     version: "0.1.1".into(),
/// };
///
/// let bytes = codec.encode(&hello).unwrap();
/// let decoded: Hello = codec.decode(&bytes).unwrap();
/// assert_eq!(hello, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

impl Codec for WireCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, ProtocolError> {
        wire::to_bytes(value)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        wire::from_bytes(data)
    }
}
