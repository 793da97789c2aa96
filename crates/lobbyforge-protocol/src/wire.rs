//! The payload wire format, implemented as a serde data format.
//!
//! Payloads have no type tags and no field names. The receiver must declare
//! a struct with exactly the same fields, in exactly the same order, as the
//! sender. The field order IS the schema.
//!
//! | Rust type                  | Wire representation                          |
//! |----------------------------|----------------------------------------------|
//! | `String` / `&str`          | int32-LE byte length, then the bytes         |
//! | [`WireBytes`]              | same as a string, no UTF-8 requirement       |
//! | `i32`, `f32`               | 4 bytes little-endian                        |
//! | `bool`                     | 1 byte, nonzero decodes as `true`            |
//! | struct / tuple / `[T; N]`  | each field in declared order, no prefix      |
//! | `Box<T>`                   | exactly like `T`                             |
//! | `Vec<T>`                   | int32-LE element count, then each element    |
//!
//! Everything else (maps, `Option`, `u8`, `i64`, enums, ...) is rejected
//! with [`ProtocolError::UnsupportedFieldKind`], both when encoding and
//! when decoding. An `Option` in particular has no representation: model
//! optional data with an explicit flag field next to the value instead.
//!
//! Implementing the format as a serde `Serializer`/`Deserializer` pair
//! means message types only need `#[derive(Serialize, Deserialize)]`.
//! The derive macros visit fields in declaration order, which is exactly
//! what the format needs.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::{self, DeserializeSeed, SeqAccess, Visitor};
use serde::ser::{self, Impossible};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Encodes a value into wire bytes.
///
/// # Errors
/// Returns [`ProtocolError::UnsupportedFieldKind`] if the value's shape
/// contains a field the format cannot represent, or
/// [`ProtocolError::LengthOverflow`] if a string or sequence is longer than
/// `i32::MAX`.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, ProtocolError> {
    let mut serializer = WireSerializer::default();
    value.serialize(&mut serializer)?;
    Ok(serializer.out.freeze())
}

/// Decodes a value from wire bytes.
///
/// Trailing bytes after the last field are ignored, since the frame layer
/// already bounds the payload.
///
/// # Errors
/// Returns [`ProtocolError::Truncated`] if the input ends early,
/// [`ProtocolError::NegativeLength`] for a bad length prefix,
/// [`ProtocolError::InvalidUtf8`] for a non-UTF-8 `String` field, or
/// [`ProtocolError::UnsupportedFieldKind`] for shapes the format cannot
/// represent.
pub fn from_bytes<'de, T: Deserialize<'de>>(input: &'de [u8]) -> Result<T, ProtocolError> {
    let mut deserializer = WireDeserializer { input };
    T::deserialize(&mut deserializer)
}

fn length_prefix(len: usize) -> Result<i32, ProtocolError> {
    i32::try_from(len).map_err(|_| ProtocolError::LengthOverflow(len))
}

// ---------------------------------------------------------------------------
// WireBytes
// ---------------------------------------------------------------------------

/// A string-shaped field whose content is arbitrary bytes.
///
/// On the wire this is identical to a `String` field (int32-LE length +
/// raw bytes), but decoding never checks for UTF-8. Use it for fields that
/// are strings "by convention" but must round-trip whatever the client sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WireBytes(pub Vec<u8>);

impl From<&str> for WireBytes {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl Serialize for WireBytes {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for WireBytes {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BytesVisitor;

        impl Visitor<'_> for BytesVisitor {
            type Value = WireBytes;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a length-prefixed byte string")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<WireBytes, E> {
                Ok(WireBytes(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<WireBytes, E> {
                Ok(WireBytes(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<WireBytes, E> {
                Ok(WireBytes(v.as_bytes().to_vec()))
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// Writes values into a growable buffer in wire order.
#[derive(Debug, Default)]
pub struct WireSerializer {
    out: BytesMut,
}

impl WireSerializer {
    fn write_len(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.out.put_i32_le(length_prefix(len)?);
        Ok(())
    }
}

/// Generates serializer methods that reject a primitive kind.
macro_rules! reject_primitives {
    ($($method:ident($ty:ty) => $kind:literal),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<(), ProtocolError> {
                Err(ProtocolError::UnsupportedFieldKind($kind))
            }
        )*
    };
}

impl<'a> ser::Serializer for &'a mut WireSerializer {
    type Ok = ();
    type Error = ProtocolError;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Impossible<(), ProtocolError>;
    type SerializeMap = Impossible<(), ProtocolError>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Impossible<(), ProtocolError>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<(), ProtocolError> {
        self.out.put_u8(u8::from(v));
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> Result<(), ProtocolError> {
        self.out.put_i32_le(v);
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), ProtocolError> {
        self.out.put_f32_le(v);
        Ok(())
    }

    reject_primitives! {
        serialize_i8(i8) => "i8",
        serialize_i16(i16) => "i16",
        serialize_i64(i64) => "i64",
        serialize_u8(u8) => "u8",
        serialize_u16(u16) => "u16",
        serialize_u32(u32) => "u32",
        serialize_u64(u64) => "u64",
        serialize_f64(f64) => "f64",
        serialize_char(char) => "char",
    }

    fn serialize_str(self, v: &str) -> Result<(), ProtocolError> {
        self.serialize_bytes(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), ProtocolError> {
        self.write_len(v.len())?;
        self.out.put_slice(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<(), ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("option"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<(), ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("option"))
    }

    fn serialize_unit(self) -> Result<(), ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("unit"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("unit struct"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("enum"))
    }

    // A newtype struct is a "single-level reference": encode the inner value.
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), ProtocolError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("enum"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, ProtocolError> {
        // The count prefix is written up front, so iterators of unknown
        // length cannot be encoded.
        let len = len.ok_or(ProtocolError::UnsupportedFieldKind("sequence of unknown length"))?;
        self.write_len(len)?;
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, ProtocolError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, ProtocolError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("enum"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("map"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, ProtocolError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("enum"))
    }
}

impl ser::SerializeSeq for &mut WireSerializer {
    type Ok = ();
    type Error = ProtocolError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

impl ser::SerializeTuple for &mut WireSerializer {
    type Ok = ();
    type Error = ProtocolError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for &mut WireSerializer {
    type Ok = ();
    type Error = ProtocolError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut WireSerializer {
    type Ok = ();
    type Error = ProtocolError;

    // Field names never reach the wire.
    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), ProtocolError> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deserializer
// ---------------------------------------------------------------------------

/// Reads values out of a borrowed byte slice in wire order.
#[derive(Debug)]
pub struct WireDeserializer<'de> {
    input: &'de [u8],
}

impl<'de> WireDeserializer<'de> {
    /// Splits `n` bytes off the front of the input.
    fn take(&mut self, n: usize) -> Result<&'de [u8], ProtocolError> {
        if self.input.len() < n {
            return Err(ProtocolError::Truncated {
                needed: n,
                remaining: self.input.len(),
            });
        }
        let (head, tail) = self.input.split_at(n);
        self.input = tail;
        Ok(head)
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(self.take(4)?.get_i32_le())
    }

    fn read_len(&mut self) -> Result<usize, ProtocolError> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))
    }

    fn read_str_bytes(&mut self) -> Result<&'de [u8], ProtocolError> {
        let len = self.read_len()?;
        self.take(len)
    }
}

/// Generates deserializer methods that reject a field kind.
macro_rules! reject_kinds {
    ($($method:ident => $kind:literal),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, ProtocolError> {
                Err(ProtocolError::UnsupportedFieldKind($kind))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for &mut WireDeserializer<'de> {
    type Error = ProtocolError;

    fn is_human_readable(&self) -> bool {
        false
    }

    reject_kinds! {
        // Without type tags there is nothing to drive a self-describing read.
        deserialize_any => "self-describing value",
        deserialize_i8 => "i8",
        deserialize_i16 => "i16",
        deserialize_i64 => "i64",
        deserialize_u8 => "u8",
        deserialize_u16 => "u16",
        deserialize_u32 => "u32",
        deserialize_u64 => "u64",
        deserialize_f64 => "f64",
        deserialize_char => "char",
        deserialize_option => "option",
        deserialize_unit => "unit",
        deserialize_map => "map",
        deserialize_identifier => "identifier",
        deserialize_ignored_any => "ignored value",
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        let byte = self.take(1)?[0];
        visitor.visit_bool(byte != 0)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        visitor.visit_i32(self.read_i32()?)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        visitor.visit_f32(self.take(4)?.get_f32_le())
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        let bytes = self.read_str_bytes()?;
        let s = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        visitor.visit_borrowed_str(s)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        visitor.visit_borrowed_bytes(self.read_str_bytes()?)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("unit struct"))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ProtocolError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProtocolError> {
        let remaining = self.read_len()?;
        visitor.visit_seq(Counted { de: self, remaining })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProtocolError> {
        visitor.visit_seq(Counted { de: self, remaining: len })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProtocolError> {
        visitor.visit_seq(Counted { de: self, remaining: len })
    }

    // Structs are read positionally: the derived visitor accepts a
    // sequence of exactly `fields.len()` values.
    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProtocolError> {
        visitor.visit_seq(Counted {
            de: self,
            remaining: fields.len(),
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ProtocolError> {
        Err(ProtocolError::UnsupportedFieldKind("enum"))
    }
}

/// Hands out exactly `remaining` elements to a sequence visitor.
struct Counted<'a, 'de> {
    de: &'a mut WireDeserializer<'de>,
    remaining: usize,
}

impl<'de> SeqAccess<'de> for Counted<'_, 'de> {
    type Error = ProtocolError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ProtocolError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

// =========================================================================
// Tests
// =========================================================================
