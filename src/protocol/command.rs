//! Command definitions
//!
//! Outbound requests. Every command lowers to a single [`Record`].

use bytes::{BufMut, BytesMut};

use super::constants::{CMD_CLOSE, CMD_GETVERSION, CMD_SIMSTEP};
use super::frame::Record;
use super::value::TypedValue;
use super::wire;

/// A get/set style command addressed to one object
///
/// Payload: variable id (1) + object id (string) + tagged parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub command_id: u8,
    pub variable_id: u8,
    pub object_id: String,
    pub parameters: Vec<TypedValue>,
}

impl Command {
    pub fn new(
        command_id: u8,
        variable_id: u8,
        object_id: impl Into<String>,
        parameters: Vec<TypedValue>,
    ) -> Self {
        Self {
            command_id,
            variable_id,
            object_id: object_id.into(),
            parameters,
        }
    }

    pub fn to_record(&self) -> Record {
        let mut payload = BytesMut::with_capacity(5 + self.object_id.len());
        payload.put_u8(self.variable_id);
        wire::put_string(&mut payload, &self.object_id);
        for parameter in &self.parameters {
            parameter.encode(&mut payload);
        }
        Record::new(self.command_id, payload.freeze())
    }
}

/// Session-level commands that carry no object address
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    /// Ask for the server's API level and version string
    GetVersion,

    /// Advance the simulation to `target_ms` (0 = a single step)
    SimulationStep { target_ms: i64 },

    /// Ask the server to end the session
    Close,
}

impl ControlCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            ControlCommand::GetVersion => CMD_GETVERSION,
            ControlCommand::SimulationStep { .. } => CMD_SIMSTEP,
            ControlCommand::Close => CMD_CLOSE,
        }
    }

    pub fn to_record(&self) -> Record {
        let mut payload = BytesMut::new();
        if let ControlCommand::SimulationStep { target_ms } = self {
            payload.put_f64(ms_to_seconds(*target_ms));
        }
        Record::new(self.command_id(), payload.freeze())
    }
}

/// Times travel as seconds on the wire
pub fn ms_to_seconds(ms: i64) -> f64 {
    ms as f64 / 1000.0
}
