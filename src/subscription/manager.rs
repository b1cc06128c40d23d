//! Subscription Manager
//!
//! Tracks active registrations and caches the values pushed for them.
//!
//! ## Push Records
//! Variable push:
//! ```text
//! object id (string) + var count (1) + var count × [var id (1) + status (1) + tagged value]
//! ```
//! Context push:
//! ```text
//! object id (string) + domain (1) + var count (1) + object count (4)
//!   + object count × [object id (string) + var count × [var id + status + tagged value]]
//! ```
//! A non-zero per-variable status carries an error string instead of a value.

use std::collections::{BTreeMap, HashMap};

use super::{CachedValue, ContextSnapshot, Subscription, SubscriptionKey};
use crate::error::{Result, TraciError};
use crate::protocol::constants::{
    in_band, CONTEXT_RESPONSE_BAND, RESPONSE_OFFSET, VARIABLE_RESPONSE_BAND,
};
use crate::protocol::{wire, Record, TypedValue};

/// Shape of a push record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushKind {
    Variable,
    Context,
}

/// Owner of all subscription state
///
/// The engine is the only writer; it holds the same lock for the round trip
/// and for applying the pushes that came back with it.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Active registrations
    active: HashMap<SubscriptionKey, Subscription>,

    /// Variable pushes: (subscribe command id, object id, variable id) → value
    values: HashMap<(u8, String, u8), CachedValue>,

    /// Context pushes, replaced wholesale on every push
    contexts: HashMap<SubscriptionKey, ContextSnapshot>,

    /// Completed simulation steps
    step: u64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Record a confirmed subscribe request
    ///
    /// An empty variable list removes the registration instead.
    pub fn register(&mut self, subscription: Subscription) {
        let key = subscription.key();

        if subscription.is_unsubscribe() {
            self.unregister(&key);
            return;
        }

        if let Some(previous) = self.active.get(&key) {
            // Values for variables dropped from the set must not linger
            let stale: Vec<u8> = previous
                .variable_ids
                .iter()
                .copied()
                .filter(|v| !subscription.variable_ids.contains(v))
                .collect();
            for variable_id in stale {
                self.values
                    .remove(&(key.command_id, key.object_id.clone(), variable_id));
            }

            // Snapshots hold every variable of the old set
            if previous.variable_ids != subscription.variable_ids {
                self.contexts.remove(&key);
            }
        }

        tracing::debug!(
            "Subscription active: '{}' via 0x{:02x} ({} variables)",
            key.object_id,
            key.command_id,
            subscription.variable_ids.len()
        );
        self.active.insert(key, subscription);
    }

    /// Drop a registration and everything cached for it
    pub fn unregister(&mut self, key: &SubscriptionKey) -> Option<Subscription> {
        let removed = self.active.remove(key)?;
        for variable_id in &removed.variable_ids {
            self.values
                .remove(&(key.command_id, key.object_id.clone(), *variable_id));
        }
        self.contexts.remove(key);
        tracing::debug!(
            "Subscription removed: '{}' via 0x{:02x}",
            key.object_id,
            key.command_id
        );
        Some(removed)
    }

    pub fn subscription(&self, key: &SubscriptionKey) -> Option<&Subscription> {
        self.active.get(key)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    // =========================================================================
    // Push Handling
    // =========================================================================

    /// Whether a reply record is an unsolicited push rather than a direct result
    pub fn is_push(&self, command_id: u8) -> bool {
        self.push_kind(command_id).is_some()
    }

    fn push_kind(&self, command_id: u8) -> Option<PushKind> {
        if in_band(command_id, CONTEXT_RESPONSE_BAND) {
            return Some(PushKind::Context);
        }
        if in_band(command_id, VARIABLE_RESPONSE_BAND) {
            return Some(PushKind::Variable);
        }
        // Domains outside the standard bands are recognised by registration
        let subscribe_id = command_id.wrapping_sub(RESPONSE_OFFSET);
        self.active.keys().find_map(|key| {
            (key.command_id == subscribe_id).then(|| match key.context_domain {
                Some(_) => PushKind::Context,
                None => PushKind::Variable,
            })
        })
    }

    /// Decode one push record into the cache
    pub fn apply_push(&mut self, record: &Record) -> Result<()> {
        match self.push_kind(record.command_id) {
            Some(PushKind::Variable) => self.apply_variable_push(record),
            Some(PushKind::Context) => self.apply_context_push(record),
            None => Err(TraciError::Protocol(format!(
                "record 0x{:02x} is not a subscription push",
                record.command_id
            ))),
        }
    }

    fn apply_variable_push(&mut self, record: &Record) -> Result<()> {
        let mut buf = &record.payload[..];
        let object_id = wire::get_string(&mut buf, "push object id")?;
        let variables = read_variables(&mut buf, &object_id)?;
        ensure_consumed(buf, record.command_id)?;

        let key = SubscriptionKey {
            object_id,
            command_id: record.command_id.wrapping_sub(RESPONSE_OFFSET),
            context_domain: None,
        };
        if !self.active.contains_key(&key) {
            tracing::warn!(
                "Dropping push 0x{:02x} for unsubscribed object '{}'",
                record.command_id,
                key.object_id
            );
            return Ok(());
        }

        for (variable_id, value) in variables {
            self.values.insert(
                (key.command_id, key.object_id.clone(), variable_id),
                CachedValue {
                    value,
                    step: self.step,
                },
            );
        }
        Ok(())
    }

    fn apply_context_push(&mut self, record: &Record) -> Result<()> {
        let mut buf = &record.payload[..];
        let object_id = wire::get_string(&mut buf, "context object id")?;
        let domain = wire::get_u8(&mut buf, "context domain")?;
        let variable_count = wire::get_u8(&mut buf, "context variable count")?;
        let object_count = wire::get_count(&mut buf, "context object count")?;

        let mut objects = BTreeMap::new();
        for _ in 0..object_count {
            let member = wire::get_string(&mut buf, "context member id")?;
            let variables = read_n_variables(&mut buf, &member, variable_count)?;
            objects.insert(member, variables);
        }
        ensure_consumed(buf, record.command_id)?;

        let key = SubscriptionKey {
            object_id,
            command_id: record.command_id.wrapping_sub(RESPONSE_OFFSET),
            context_domain: Some(domain),
        };
        if !self.active.contains_key(&key) {
            tracing::warn!(
                "Dropping context push 0x{:02x} for unsubscribed object '{}'",
                record.command_id,
                key.object_id
            );
            return Ok(());
        }

        self.contexts.insert(
            key,
            ContextSnapshot {
                objects,
                step: self.step,
            },
        );
        Ok(())
    }

    /// Count a completed simulation step
    ///
    /// With a known simulation time, registrations whose window ended before
    /// it are dropped.
    pub fn advance_step(&mut self, time_ms: Option<i64>) {
        self.step += 1;

        let Some(now) = time_ms else {
            return;
        };
        let expired: Vec<SubscriptionKey> = self
            .active
            .iter()
            .filter(|(_, sub)| sub.end_ms < now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            tracing::debug!("Subscription window of '{}' has elapsed", key.object_id);
            self.unregister(&key);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Latest pushed value of a subscribed variable
    ///
    /// `NoData` until a push for it has arrived.
    pub fn value(&self, command_id: u8, object_id: &str, variable_id: u8) -> Result<&CachedValue> {
        self.values
            .get(&(command_id, object_id.to_string(), variable_id))
            .ok_or_else(|| TraciError::NoData {
                object_id: object_id.to_string(),
                variable_id,
            })
    }

    /// Latest context push for a context subscription
    ///
    /// `NoContextData` until the first push has arrived.
    pub fn context_results(
        &self,
        command_id: u8,
        object_id: &str,
        domain: u8,
    ) -> Result<&ContextSnapshot> {
        let key = SubscriptionKey {
            object_id: object_id.to_string(),
            command_id,
            context_domain: Some(domain),
        };
        self.contexts
            .get(&key)
            .ok_or_else(|| TraciError::NoContextData {
                object_id: object_id.to_string(),
                domain,
            })
    }
}

/// Read `var count (1)` followed by that many variable entries
fn read_variables(buf: &mut &[u8], object_id: &str) -> Result<BTreeMap<u8, TypedValue>> {
    let count = wire::get_u8(buf, "push variable count")?;
    read_n_variables(buf, object_id, count)
}

fn read_n_variables(
    buf: &mut &[u8],
    object_id: &str,
    count: u8,
) -> Result<BTreeMap<u8, TypedValue>> {
    let mut variables = BTreeMap::new();
    for _ in 0..count {
        let variable_id = wire::get_u8(buf, "push variable id")?;
        let status = wire::get_u8(buf, "push variable status")?;
        let value = TypedValue::decode_tagged(buf)?;
        if status != 0x00 {
            tracing::warn!(
                "Server could not report variable 0x{:02x} of '{}': {:?}",
                variable_id,
                object_id,
                value
            );
            continue;
        }
        variables.insert(variable_id, value);
    }
    Ok(variables)
}

fn ensure_consumed(buf: &[u8], command_id: u8) -> Result<()> {
    if !buf.is_empty() {
        return Err(TraciError::Protocol(format!(
            "{} unread bytes after push 0x{:02x}",
            buf.len(),
            command_id
        )));
    }
    Ok(())
}
