//! Network Module
//!
//! TCP transport to the simulation server.
//!
//! ## Architecture
//! - One socket, one client
//! - Strict request/response: never more than one outstanding request

mod connection;

pub use connection::{Connection, ConnectionState};
