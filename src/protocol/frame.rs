//! Message framing
//!
//! ## Wire Format
//!
//! ### Message
//! ```text
//! ┌──────────────┬───────────┬───────────┬─────┐
//! │ Total (4)    │ Record 1  │ Record 2  │ ... │
//! └──────────────┴───────────┴───────────┴─────┘
//! ```
//! `Total` counts itself.
//!
//! ### Record
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Len (4)  │ Cmd (1)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! `Len` counts itself and the command id byte.
//!
//! Records are split by walking declared lengths, never by scanning payload
//! bytes.

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TraciError};

/// Size of the outer message length prefix
pub const MESSAGE_HEADER_SIZE: usize = 4;

/// Record header: length (4) + command id (1)
pub const RECORD_HEADER_SIZE: usize = 5;

/// One command or reply unit inside a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub command_id: u8,
    pub payload: Bytes,
}

impl Record {
    pub fn new(command_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command_id,
            payload: payload.into(),
        }
    }

    /// Encoded size including the record header
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.payload.len()
    }

    /// Append `[len][cmd][payload]` to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.encoded_len() as i32);
        buf.put_u8(self.command_id);
        buf.put_slice(&self.payload);
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Frame records into one message with an outer length prefix
pub fn encode_message(records: &[Record]) -> Bytes {
    let body_len: usize = records.iter().map(Record::encoded_len).sum();
    let total = MESSAGE_HEADER_SIZE + body_len;

    let mut buf = BytesMut::with_capacity(total);
    buf.put_i32(total as i32);
    for record in records {
        record.encode(&mut buf);
    }
    buf.freeze()
}

/// Write a framed message to a stream
pub fn write_message<W: Write>(writer: &mut W, message: &[u8]) -> Result<()> {
    writer.write_all(message)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Inbound
// =============================================================================

/// Read one complete message from a stream
///
/// Blocks until the declared number of bytes has arrived. Returns the body
/// without the outer length prefix.
pub fn read_message<R: Read>(reader: &mut R, max_size: u32) -> Result<Bytes> {
    let header = read_header(reader)?;

    let total = i32::from_be_bytes(header);
    if total < MESSAGE_HEADER_SIZE as i32 {
        return Err(TraciError::Framing(format!(
            "declared message length {} is smaller than its own prefix",
            total
        )));
    }
    if total as u32 > max_size {
        return Err(TraciError::Framing(format!(
            "message too large: {} bytes (max {})",
            total, max_size
        )));
    }

    let mut body = vec![0u8; total as usize - MESSAGE_HEADER_SIZE];
    if let Err(e) = reader.read_exact(&mut body) {
        if e.kind() == ErrorKind::UnexpectedEof {
            return Err(TraciError::Framing(format!(
                "stream closed inside a {} byte message",
                total
            )));
        }
        return Err(e.into());
    }

    Ok(Bytes::from(body))
}

/// Read the outer length prefix
///
/// A stream that ends before the first byte is an I/O error. One that ends
/// partway through the prefix is a truncated message.
fn read_header<R: Read>(reader: &mut R) -> Result<[u8; MESSAGE_HEADER_SIZE]> {
    let mut header = [0u8; MESSAGE_HEADER_SIZE];
    let mut filled = 0;
    while filled < MESSAGE_HEADER_SIZE {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => {
                return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into())
            }
            Ok(0) => {
                return Err(TraciError::Framing(format!(
                    "stream closed after {} of {} length prefix bytes",
                    filled, MESSAGE_HEADER_SIZE
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(header)
}

/// Split a message body into records
pub fn split_records(body: &Bytes) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < body.len() {
        let remaining = body.len() - pos;
        if remaining < RECORD_HEADER_SIZE {
            return Err(TraciError::Framing(format!(
                "{} trailing bytes cannot hold a record header",
                remaining
            )));
        }

        let len = i32::from_be_bytes([body[pos], body[pos + 1], body[pos + 2], body[pos + 3]]);
        if len < RECORD_HEADER_SIZE as i32 {
            return Err(TraciError::Framing(format!(
                "record length {} at offset {} is below the header size",
                len, pos
            )));
        }
        let len = len as usize;
        if len > remaining {
            return Err(TraciError::Framing(format!(
                "record at offset {} declares {} bytes, only {} left",
                pos, len, remaining
            )));
        }

        records.push(Record {
            command_id: body[pos + 4],
            payload: body.slice(pos + RECORD_HEADER_SIZE..pos + len),
        });
        pos += len;
    }

    Ok(records)
}

/// Decode a complete message, outer length prefix included
///
/// The declared length must match the buffer exactly.
pub fn decode_message(bytes: &[u8]) -> Result<Vec<Record>> {
    if bytes.len() < MESSAGE_HEADER_SIZE {
        return Err(TraciError::Framing(format!(
            "incomplete message header: expected {} bytes, got {}",
            MESSAGE_HEADER_SIZE,
            bytes.len()
        )));
    }

    let total = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if total < 0 || total as usize != bytes.len() {
        return Err(TraciError::Framing(format!(
            "declared message length {} does not match {} available bytes",
            total,
            bytes.len()
        )));
    }

    split_records(&Bytes::copy_from_slice(&bytes[MESSAGE_HEADER_SIZE..]))
}
