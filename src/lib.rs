//! # tracilink
//!
//! A blocking TraCI client engine with:
//! - Tagged value codec (integers, doubles, strings, lists, compounds)
//! - Length-prefixed message and record framing
//! - Serialized request/response round trips over one TCP connection
//! - Variable and context subscriptions with a pushed-value cache
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Callers (DomainHandle / raw ids)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Command Engine (Client)                      │
//! │              (one round trip in flight)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │  Protocol   │          │ Subscriptions│
//!   │(codec/frame)│          │   (cache)    │
//!   └──────┬──────┘          └──────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ Connection  │
//!   │   (TCP)     │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod subscription;
pub mod engine;
pub mod domain;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TraciError};
pub use config::Config;
pub use engine::Client;
pub use domain::{Domain, DomainHandle};
pub use protocol::{Command, CommandResult, StatusCode, TypedValue};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tracilink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
