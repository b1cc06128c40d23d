//! Typed values
//!
//! The tagged value format carried by command parameters, get responses and
//! subscription pushes.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬─────────────────────────────────────────┐
//! │ Tag (1)  │ Body (size determined by the tag)       │
//! └──────────┴─────────────────────────────────────────┘
//! ```
//!
//! - Integer / Double: fixed width, big-endian
//! - String: len (4) + UTF-8 bytes
//! - StringList: count (4) + count strings
//! - Compound: count (4) + count tagged values
//! - DoubleList: count (4) + count doubles

use bytes::{BufMut, Bytes, BytesMut};

use super::wire;
use crate::error::{Result, TraciError};

// =============================================================================
// Type Tags
// =============================================================================

pub const TYPE_POSITION_2D: u8 = 0x01;
pub const TYPE_POSITION_3D: u8 = 0x03;
pub const TYPE_UBYTE: u8 = 0x07;
pub const TYPE_BYTE: u8 = 0x08;
pub const TYPE_INTEGER: u8 = 0x09;
pub const TYPE_DOUBLE: u8 = 0x0B;
pub const TYPE_STRING: u8 = 0x0C;
pub const TYPE_STRING_LIST: u8 = 0x0E;
pub const TYPE_COMPOUND: u8 = 0x0F;
pub const TYPE_DOUBLE_LIST: u8 = 0x10;
pub const TYPE_COLOR: u8 = 0x11;

/// Deepest compound nesting accepted on decode
pub const MAX_COMPOUND_DEPTH: usize = 32;

/// A value in the protocol's tagged format
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    UByte(u8),
    Byte(i8),
    Integer(i32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    /// Heterogeneous sequence of tagged values
    Compound(Vec<TypedValue>),
    DoubleList(Vec<f64>),
    Position2D { x: f64, y: f64 },
    Position3D { x: f64, y: f64, z: f64 },
    Color { r: u8, g: u8, b: u8, a: u8 },
}

impl TypedValue {
    /// The tag byte written before the body
    pub fn tag(&self) -> u8 {
        match self {
            TypedValue::UByte(_) => TYPE_UBYTE,
            TypedValue::Byte(_) => TYPE_BYTE,
            TypedValue::Integer(_) => TYPE_INTEGER,
            TypedValue::Double(_) => TYPE_DOUBLE,
            TypedValue::String(_) => TYPE_STRING,
            TypedValue::StringList(_) => TYPE_STRING_LIST,
            TypedValue::Compound(_) => TYPE_COMPOUND,
            TypedValue::DoubleList(_) => TYPE_DOUBLE_LIST,
            TypedValue::Position2D { .. } => TYPE_POSITION_2D,
            TypedValue::Position3D { .. } => TYPE_POSITION_3D,
            TypedValue::Color { .. } => TYPE_COLOR,
        }
    }

    /// Human-readable variant name, used in type mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::UByte(_) => "ubyte",
            TypedValue::Byte(_) => "byte",
            TypedValue::Integer(_) => "integer",
            TypedValue::Double(_) => "double",
            TypedValue::String(_) => "string",
            TypedValue::StringList(_) => "string list",
            TypedValue::Compound(_) => "compound",
            TypedValue::DoubleList(_) => "double list",
            TypedValue::Position2D { .. } => "2D position",
            TypedValue::Position3D { .. } => "3D position",
            TypedValue::Color { .. } => "color",
        }
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Append tag and body to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag());
        self.encode_body(buf);
    }

    /// Append the body only (no tag)
    pub fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            TypedValue::UByte(v) => buf.put_u8(*v),
            TypedValue::Byte(v) => buf.put_i8(*v),
            TypedValue::Integer(v) => buf.put_i32(*v),
            TypedValue::Double(v) => buf.put_f64(*v),
            TypedValue::String(v) => wire::put_string(buf, v),
            TypedValue::StringList(items) => wire::put_string_list(buf, items),
            TypedValue::Compound(items) => {
                buf.put_i32(items.len() as i32);
                for item in items {
                    item.encode(buf);
                }
            }
            TypedValue::DoubleList(items) => {
                buf.put_i32(items.len() as i32);
                for item in items {
                    buf.put_f64(*item);
                }
            }
            TypedValue::Position2D { x, y } => {
                buf.put_f64(*x);
                buf.put_f64(*y);
            }
            TypedValue::Position3D { x, y, z } => {
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*z);
            }
            TypedValue::Color { r, g, b, a } => {
                buf.put_slice(&[*r, *g, *b, *a]);
            }
        }
    }

    /// Encode into a fresh buffer, tag included
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode the body of a value whose tag has already been read
    ///
    /// Returns the value and the number of bytes consumed from `bytes`.
    pub fn decode(tag: u8, bytes: &[u8]) -> Result<(TypedValue, usize)> {
        let mut cursor = bytes;
        let value = decode_body(tag, &mut cursor, 0)?;
        Ok((value, bytes.len() - cursor.len()))
    }

    /// Read a tag followed by its body, advancing the cursor
    pub fn decode_tagged(buf: &mut &[u8]) -> Result<TypedValue> {
        let tag = wire::get_u8(buf, "type tag")?;
        decode_body(tag, buf, 0)
    }

    // =========================================================================
    // Checked Downcasts
    // =========================================================================

    fn mismatch(&self, expected: &'static str) -> TraciError {
        TraciError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            TypedValue::String(v) => Ok(v),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_string_list(self) -> Result<Vec<String>> {
        match self {
            TypedValue::StringList(v) => Ok(v),
            other => Err(other.mismatch("string list")),
        }
    }

    pub fn into_compound(self) -> Result<Vec<TypedValue>> {
        match self {
            TypedValue::Compound(v) => Ok(v),
            other => Err(other.mismatch("compound")),
        }
    }

    pub fn into_double_list(self) -> Result<Vec<f64>> {
        match self {
            TypedValue::DoubleList(v) => Ok(v),
            other => Err(other.mismatch("double list")),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        match self {
            TypedValue::Integer(v) => Ok(*v),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            TypedValue::Double(v) => Ok(*v),
            other => Err(other.mismatch("double")),
        }
    }

    /// Booleans travel as a byte or integer holding 0 or 1
    pub fn as_bool(&self) -> Result<bool> {
        let raw = match self {
            TypedValue::UByte(v) => i32::from(*v),
            TypedValue::Byte(v) => i32::from(*v),
            TypedValue::Integer(v) => *v,
            other => return Err(other.mismatch("boolean")),
        };
        match raw {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(TraciError::TypeMismatch {
                expected: "boolean",
                found: "integer outside 0..=1",
            }),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<Vec<String>> for TypedValue {
    fn from(value: Vec<String>) -> Self {
        TypedValue::StringList(value)
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Double(value)
    }
}

fn decode_body(tag: u8, buf: &mut &[u8], depth: usize) -> Result<TypedValue> {
    let value = match tag {
        TYPE_UBYTE => TypedValue::UByte(wire::get_u8(buf, "ubyte")?),
        TYPE_BYTE => TypedValue::Byte(wire::get_i8(buf, "byte")?),
        TYPE_INTEGER => TypedValue::Integer(wire::get_i32(buf, "integer")?),
        TYPE_DOUBLE => TypedValue::Double(wire::get_f64(buf, "double")?),
        TYPE_STRING => TypedValue::String(wire::get_string(buf, "string")?),
        TYPE_STRING_LIST => {
            let count = wire::get_count(buf, "string list count")?;
            // Every string needs at least its 4-byte length
            wire::ensure(buf, count.saturating_mul(4), "string list")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(wire::get_string(buf, "string list item")?);
            }
            TypedValue::StringList(items)
        }
        TYPE_COMPOUND => {
            if depth >= MAX_COMPOUND_DEPTH {
                return Err(TraciError::Codec(format!(
                    "compound nesting deeper than {}",
                    MAX_COMPOUND_DEPTH
                )));
            }
            let count = wire::get_count(buf, "compound count")?;
            wire::ensure(buf, count, "compound")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let item_tag = wire::get_u8(buf, "compound item tag")?;
                items.push(decode_body(item_tag, buf, depth + 1)?);
            }
            TypedValue::Compound(items)
        }
        TYPE_DOUBLE_LIST => {
            let count = wire::get_count(buf, "double list count")?;
            wire::ensure(buf, count.saturating_mul(8), "double list")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(wire::get_f64(buf, "double list item")?);
            }
            TypedValue::DoubleList(items)
        }
        TYPE_POSITION_2D => TypedValue::Position2D {
            x: wire::get_f64(buf, "position x")?,
            y: wire::get_f64(buf, "position y")?,
        },
        TYPE_POSITION_3D => TypedValue::Position3D {
            x: wire::get_f64(buf, "position x")?,
            y: wire::get_f64(buf, "position y")?,
            z: wire::get_f64(buf, "position z")?,
        },
        TYPE_COLOR => {
            wire::ensure(buf, 4, "color")?;
            TypedValue::Color {
                r: wire::get_u8(buf, "color")?,
                g: wire::get_u8(buf, "color")?,
                b: wire::get_u8(buf, "color")?,
                a: wire::get_u8(buf, "color")?,
            }
        }
        other => {
            return Err(TraciError::Codec(format!(
                "unknown type tag: 0x{:02x}",
                other
            )))
        }
    };
    Ok(value)
}
