//! Subscription Module
//!
//! Standing registrations that make the server attach variable updates to
//! later replies.
//!
//! ## Lifecycle (per key = object id + command id + context domain)
//! ```text
//!   Unregistered ──subscribe ok──▶ Active ──re-subscribe──▶ Active (replaced)
//!        ▲                           │
//!        └──── empty variable list ──┤
//!        └──── end time passed ──────┘
//! ```
//!
//! ## Request Payload
//! ```text
//! begin (8, seconds) + end (8, seconds) + object id (string)
//!   [+ domain (1) + range (8)]          (context subscriptions only)
//!   + var count (1) + var ids (1 each)
//! ```

mod manager;

pub use manager::SubscriptionManager;

use std::collections::BTreeMap;

use bytes::{BufMut, BytesMut};

use crate::error::{Result, TraciError};
use crate::protocol::{ms_to_seconds, wire, Record, TypedValue};

/// Conventional "until the end of the simulation" end time
pub const END_OF_TIME_MS: i64 = i32::MAX as i64 * 1000;

/// Spatial scope of a context subscription
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextScope {
    /// Domain (entity class) of the objects to report, as its get command id
    pub domain: u8,

    /// Radius around the reference object
    pub range: f64,
}

/// A registration as the caller requested it
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub object_id: String,
    pub command_id: u8,
    pub variable_ids: Vec<u8>,
    pub begin_ms: i64,
    pub end_ms: i64,
    pub context: Option<ContextScope>,
}

impl Subscription {
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            object_id: self.object_id.clone(),
            command_id: self.command_id,
            context_domain: self.context.map(|c| c.domain),
        }
    }

    /// Whether this request removes the registration instead of creating one
    pub fn is_unsubscribe(&self) -> bool {
        self.variable_ids.is_empty()
    }

    /// Encode the request
    ///
    /// The variable count travels as one byte, so more than 255 ids cannot
    /// be expressed and are refused before anything is sent.
    pub fn to_record(&self) -> Result<Record> {
        let variable_count = u8::try_from(self.variable_ids.len()).map_err(|_| {
            TraciError::Codec(format!(
                "subscription for '{}' lists {} variables (max {})",
                self.object_id,
                self.variable_ids.len(),
                u8::MAX
            ))
        })?;

        let mut payload = BytesMut::with_capacity(32 + self.object_id.len());
        payload.put_f64(ms_to_seconds(self.begin_ms));
        payload.put_f64(ms_to_seconds(self.end_ms));
        wire::put_string(&mut payload, &self.object_id);
        if let Some(scope) = self.context {
            payload.put_u8(scope.domain);
            payload.put_f64(scope.range);
        }
        payload.put_u8(variable_count);
        payload.put_slice(&self.variable_ids);
        Ok(Record::new(self.command_id, payload.freeze()))
    }
}

/// Identity of a registration; re-subscribing with the same key replaces it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    pub object_id: String,
    pub command_id: u8,
    pub context_domain: Option<u8>,
}

/// Latest pushed value of one variable
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub value: TypedValue,

    /// Step counter at the time the value arrived
    pub step: u64,
}

/// Latest context push: object id → variable id → value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    pub objects: BTreeMap<String, BTreeMap<u8, TypedValue>>,
    pub step: u64,
}

impl ContextSnapshot {
    pub fn get(&self, object_id: &str, variable_id: u8) -> Option<&TypedValue> {
        self.objects.get(object_id)?.get(&variable_id)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }
}
