//! Wire primitives
//!
//! Bounds-checked big-endian readers and writers shared by the value codec,
//! the framer and the record parsers. Readers advance a `&[u8]` cursor and
//! report truncation as a framing error; `bytes::Buf` would panic instead.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TraciError};

/// Fail with a framing error unless `n` more bytes are available
pub fn ensure(buf: &[u8], n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(TraciError::Framing(format!(
            "truncated {}: need {} bytes, {} left",
            what,
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn get_u8(buf: &mut &[u8], what: &str) -> Result<u8> {
    ensure(buf, 1, what)?;
    Ok(buf.get_u8())
}

pub fn get_i8(buf: &mut &[u8], what: &str) -> Result<i8> {
    ensure(buf, 1, what)?;
    Ok(buf.get_i8())
}

pub fn get_i32(buf: &mut &[u8], what: &str) -> Result<i32> {
    ensure(buf, 4, what)?;
    Ok(buf.get_i32())
}

pub fn get_f64(buf: &mut &[u8], what: &str) -> Result<f64> {
    ensure(buf, 8, what)?;
    Ok(buf.get_f64())
}

/// Read a 4-byte count; negative values are malformed, not truncated
pub fn get_count(buf: &mut &[u8], what: &str) -> Result<usize> {
    let count = get_i32(buf, what)?;
    if count < 0 {
        return Err(TraciError::Codec(format!("negative {}: {}", what, count)));
    }
    Ok(count as usize)
}

/// Read a length-prefixed UTF-8 string
pub fn get_string(buf: &mut &[u8], what: &str) -> Result<String> {
    let len = get_count(buf, what)?;
    ensure(buf, len, what)?;
    let data: &[u8] = *buf;
    let (raw, rest) = data.split_at(len);
    let text = std::str::from_utf8(raw)
        .map_err(|e| TraciError::Codec(format!("{} is not valid UTF-8: {}", what, e)))?
        .to_string();
    *buf = rest;
    Ok(text)
}

pub fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_i32(value.len() as i32);
    buf.put_slice(value.as_bytes());
}

pub fn put_string_list(buf: &mut BytesMut, values: &[String]) {
    buf.put_i32(values.len() as i32);
    for value in values {
        put_string(buf, value);
    }
}
