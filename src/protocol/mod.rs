//! Protocol Module
//!
//! Defines the TraCI wire protocol as seen from the client.
//!
//! ## Layers
//! - `value`: tagged values (integers, doubles, strings, lists, compounds)
//! - `frame`: length-prefixed messages made of length-prefixed records
//! - `command` / `response`: what goes inside outbound and inbound records
//!
//! ## Status Codes
//! - 0x00: SUCCESS
//! - 0x01: NOT_IMPLEMENTED
//! - 0xFF: ERROR

pub mod constants;
pub mod wire;
mod command;
mod frame;
mod response;
mod value;

pub use command::{ms_to_seconds, Command, ControlCommand};
pub use frame::{
    decode_message, encode_message, read_message, split_records, write_message, Record,
    MESSAGE_HEADER_SIZE, RECORD_HEADER_SIZE,
};
pub use response::{CommandResult, GetResponse, StatusCode, StatusResponse, VersionResponse};
pub use value::{
    TypedValue, MAX_COMPOUND_DEPTH, TYPE_BYTE, TYPE_COLOR, TYPE_COMPOUND, TYPE_DOUBLE,
    TYPE_DOUBLE_LIST, TYPE_INTEGER, TYPE_POSITION_2D, TYPE_POSITION_3D, TYPE_STRING,
    TYPE_STRING_LIST, TYPE_UBYTE,
};
