//! Error types for tracilink
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::StatusCode;

/// Result type alias using TraciError
pub type Result<T> = std::result::Result<T, TraciError>;

/// Unified error type for tracilink operations
#[derive(Debug, Error)]
pub enum TraciError {
    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("Command 0x{command_id:02x} rejected ({status:?}): {description}")]
    CommandRejected {
        command_id: u8,
        status: StatusCode,
        description: String,
    },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    // -------------------------------------------------------------------------
    // Subscription Errors
    // -------------------------------------------------------------------------
    #[error("No data received yet for variable 0x{variable_id:02x} of '{object_id}'")]
    NoData { object_id: String, variable_id: u8 },

    #[error("No context data received yet for domain 0x{domain:02x} around '{object_id}'")]
    NoContextData { object_id: String, domain: u8 },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TraciError {
    /// Whether this error leaves the byte stream in an unknown position.
    ///
    /// The connection must be dropped after any of these.
    pub fn is_desync(&self) -> bool {
        matches!(self, TraciError::Io(_) | TraciError::Framing(_))
    }
}
