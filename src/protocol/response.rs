//! Response definitions
//!
//! Every command's reply opens with a status record:
//! ```text
//! ┌──────────┬──────────┬───────────┬─────────────────────┐
//! │ Len (4)  │ Cmd (1)  │Status (1) │ Description (string)│
//! └──────────┴──────────┴───────────┴─────────────────────┘
//! ```
//! Get commands add a result record:
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────┬──────────────┐
//! │ Len (4)  │ Cmd (1)  │ Var (1)  │ Obj (string)│ Tagged value │
//! └──────────┴──────────┴──────────┴─────────────┴──────────────┘
//! ```

use bytes::{BufMut, BytesMut};

use super::frame::Record;
use super::value::TypedValue;
use super::wire;
use crate::error::{Result, TraciError};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0x00,
    NotImplemented = 0x01,
    Error = 0xFF,
}

impl StatusCode {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(StatusCode::Success),
            0x01 => Ok(StatusCode::NotImplemented),
            0xFF => Ok(StatusCode::Error),
            _ => Err(TraciError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// The status record that precedes every reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub command_id: u8,
    pub status: StatusCode,
    pub description: String,
}

impl StatusResponse {
    pub fn parse(record: &Record) -> Result<Self> {
        let mut buf = &record.payload[..];
        let status = StatusCode::from_u8(wire::get_u8(&mut buf, "status code")?)?;
        let description = wire::get_string(&mut buf, "status description")?;
        Ok(Self {
            command_id: record.command_id,
            status,
            description,
        })
    }

    pub fn to_record(&self) -> Record {
        let mut payload = BytesMut::with_capacity(5 + self.description.len());
        payload.put_u8(self.status as u8);
        wire::put_string(&mut payload, &self.description);
        Record::new(self.command_id, payload.freeze())
    }

    /// Convert a non-success status into `CommandRejected`
    pub fn check(&self) -> Result<()> {
        match self.status {
            StatusCode::Success => Ok(()),
            status => Err(TraciError::CommandRejected {
                command_id: self.command_id,
                status,
                description: self.description.clone(),
            }),
        }
    }
}

/// Result record of a get command
#[derive(Debug, Clone, PartialEq)]
pub struct GetResponse {
    pub command_id: u8,
    pub variable_id: u8,
    pub object_id: String,
    pub value: TypedValue,
}

impl GetResponse {
    pub fn parse(record: &Record) -> Result<Self> {
        let mut buf = &record.payload[..];
        let variable_id = wire::get_u8(&mut buf, "variable id")?;
        let object_id = wire::get_string(&mut buf, "object id")?;
        let value = TypedValue::decode_tagged(&mut buf)?;
        if !buf.is_empty() {
            return Err(TraciError::Protocol(format!(
                "{} unread bytes after get response for '{}'",
                buf.len(),
                object_id
            )));
        }
        Ok(Self {
            command_id: record.command_id,
            variable_id,
            object_id,
            value,
        })
    }

    pub fn to_record(&self) -> Record {
        let mut payload = BytesMut::new();
        payload.put_u8(self.variable_id);
        wire::put_string(&mut payload, &self.object_id);
        self.value.encode(&mut payload);
        Record::new(self.command_id, payload.freeze())
    }
}

/// Result record of the version command: api level (4) + version string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionResponse {
    pub api_version: i32,
    pub version: String,
}

impl VersionResponse {
    pub fn parse(record: &Record) -> Result<Self> {
        let mut buf = &record.payload[..];
        let api_version = wire::get_i32(&mut buf, "api version")?;
        let version = wire::get_string(&mut buf, "version string")?;
        Ok(Self {
            api_version,
            version,
        })
    }
}

/// Outcome of one command in a round trip
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub status_command_id: u8,
    pub status: StatusCode,
    pub description: String,
    pub payload: Option<TypedValue>,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::Success
    }

    /// The payload of a successful result, or the rejection as an error
    pub fn into_payload(self) -> Result<Option<TypedValue>> {
        if self.status != StatusCode::Success {
            return Err(TraciError::CommandRejected {
                command_id: self.status_command_id,
                status: self.status,
                description: self.description,
            });
        }
        Ok(self.payload)
    }
}
