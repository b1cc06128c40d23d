//! Command and variable identifiers
//!
//! The engine treats these as opaque bytes. They are collected here so that
//! callers and the domain facade share one vocabulary.

// =============================================================================
// Control Commands
// =============================================================================

pub const CMD_GETVERSION: u8 = 0x00;
pub const CMD_SIMSTEP: u8 = 0x02;
pub const CMD_CLOSE: u8 = 0x7F;

// =============================================================================
// Response Id Layout
// =============================================================================

/// Reply id = command id + this offset, for gets and subscriptions alike
pub const RESPONSE_OFFSET: u8 = 0x10;

/// Context subscription commands
pub const CONTEXT_SUBSCRIBE_BAND: (u8, u8) = (0x80, 0x8F);

/// Context subscription pushes
pub const CONTEXT_RESPONSE_BAND: (u8, u8) = (0x90, 0x9F);

/// Variable subscription commands
pub const VARIABLE_SUBSCRIBE_BAND: (u8, u8) = (0xD0, 0xDF);

/// Variable subscription pushes
pub const VARIABLE_RESPONSE_BAND: (u8, u8) = (0xE0, 0xEF);

pub fn in_band(id: u8, band: (u8, u8)) -> bool {
    (band.0..=band.1).contains(&id)
}

// =============================================================================
// Common Variables
// =============================================================================

pub const ID_LIST: u8 = 0x00;
pub const ID_COUNT: u8 = 0x01;
pub const VAR_SPEED: u8 = 0x40;
pub const VAR_POSITION: u8 = 0x42;
pub const VAR_ROAD_ID: u8 = 0x50;
pub const VAR_LANE_ID: u8 = 0x51;
pub const VAR_EDGES: u8 = 0x54;
pub const VAR_TIME: u8 = 0x66;
pub const VAR_ADD: u8 = 0x80;
pub const VAR_REMOVE: u8 = 0x81;
