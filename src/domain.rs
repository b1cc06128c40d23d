//! Domain facade
//!
//! An entity class (routes, vehicles, lanes, ...) is a [`Domain`]: the four
//! command ids it answers to. [`DomainHandle`] pairs one with a client and
//! offers typed getters, so callers never downcast a [`TypedValue`] by hand.

use crate::engine::Client;
use crate::error::Result;
use crate::protocol::constants::{ID_COUNT, ID_LIST};
use crate::protocol::TypedValue;
use crate::subscription::{CachedValue, ContextSnapshot, END_OF_TIME_MS};

/// Command ids of one entity class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
    pub name: &'static str,
    pub get_command: u8,
    pub set_command: u8,
    pub subscribe_command: u8,
    pub context_subscribe_command: u8,
}

impl Domain {
    /// Standard layout: get 0xAn, set 0xCn, subscribe 0xDn, context 0x8n
    pub const fn standard(name: &'static str, index: u8) -> Self {
        Self {
            name,
            get_command: 0xA0 + index,
            set_command: 0xC0 + index,
            subscribe_command: 0xD0 + index,
            context_subscribe_command: 0x80 + index,
        }
    }

    /// Look a standard domain up by name
    pub fn by_name(name: &str) -> Option<Domain> {
        ALL.iter().copied().find(|d| d.name == name)
    }
}

pub const INDUCTION_LOOP: Domain = Domain::standard("inductionloop", 0x00);
pub const MULTI_ENTRY_EXIT: Domain = Domain::standard("multientryexit", 0x01);
pub const TRAFFIC_LIGHT: Domain = Domain::standard("trafficlight", 0x02);
pub const LANE: Domain = Domain::standard("lane", 0x03);
pub const VEHICLE: Domain = Domain::standard("vehicle", 0x04);
pub const VEHICLE_TYPE: Domain = Domain::standard("vehicletype", 0x05);
pub const ROUTE: Domain = Domain::standard("route", 0x06);
pub const POI: Domain = Domain::standard("poi", 0x07);
pub const POLYGON: Domain = Domain::standard("polygon", 0x08);
pub const JUNCTION: Domain = Domain::standard("junction", 0x09);
pub const EDGE: Domain = Domain::standard("edge", 0x0A);
pub const SIMULATION: Domain = Domain::standard("simulation", 0x0B);
pub const LANE_AREA: Domain = Domain::standard("lanearea", 0x0D);
pub const PERSON: Domain = Domain::standard("person", 0x0E);

/// Every standard domain
pub const ALL: [Domain; 14] = [
    INDUCTION_LOOP,
    MULTI_ENTRY_EXIT,
    TRAFFIC_LIGHT,
    LANE,
    VEHICLE,
    VEHICLE_TYPE,
    ROUTE,
    POI,
    POLYGON,
    JUNCTION,
    EDGE,
    SIMULATION,
    LANE_AREA,
    PERSON,
];

/// A domain bound to a client
pub struct DomainHandle<'a> {
    client: &'a Client,
    domain: Domain,
}

impl<'a> DomainHandle<'a> {
    pub fn new(client: &'a Client, domain: Domain) -> Self {
        Self { client, domain }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    // -------------------------------------------------------------------------
    // Getters
    // -------------------------------------------------------------------------

    pub fn get(
        &self,
        variable_id: u8,
        object_id: &str,
        parameters: &[TypedValue],
    ) -> Result<TypedValue> {
        self.client
            .execute_get(self.domain.get_command, variable_id, object_id, parameters)
    }

    /// Ids of all objects in this domain, in server order
    pub fn get_id_list(&self) -> Result<Vec<String>> {
        self.get_string_list(ID_LIST, "")
    }

    pub fn get_id_count(&self) -> Result<i32> {
        self.get_int(ID_COUNT, "")
    }

    pub fn get_string(&self, variable_id: u8, object_id: &str) -> Result<String> {
        self.get(variable_id, object_id, &[])?.into_string()
    }

    pub fn get_string_list(&self, variable_id: u8, object_id: &str) -> Result<Vec<String>> {
        self.get(variable_id, object_id, &[])?.into_string_list()
    }

    pub fn get_int(&self, variable_id: u8, object_id: &str) -> Result<i32> {
        self.get(variable_id, object_id, &[])?.as_i32()
    }

    pub fn get_double(&self, variable_id: u8, object_id: &str) -> Result<f64> {
        self.get(variable_id, object_id, &[])?.as_f64()
    }

    pub fn get_bool(&self, variable_id: u8, object_id: &str) -> Result<bool> {
        self.get(variable_id, object_id, &[])?.as_bool()
    }

    // -------------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------------

    pub fn set(
        &self,
        variable_id: u8,
        object_id: &str,
        value: impl Into<TypedValue>,
    ) -> Result<bool> {
        self.client
            .execute_set(self.domain.set_command, variable_id, object_id, value.into())
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Subscribe to variables of one object for the given window
    pub fn subscribe(
        &self,
        object_id: &str,
        variable_ids: &[u8],
        begin_ms: i64,
        end_ms: i64,
    ) -> Result<()> {
        self.client.execute_subscribe(
            begin_ms,
            end_ms,
            object_id,
            self.domain.subscribe_command,
            variable_ids,
        )
    }

    /// Subscribe from now until the end of the simulation
    pub fn subscribe_all(&self, object_id: &str, variable_ids: &[u8]) -> Result<()> {
        self.subscribe(object_id, variable_ids, 0, END_OF_TIME_MS)
    }

    pub fn unsubscribe(&self, object_id: &str) -> Result<()> {
        self.subscribe(object_id, &[], 0, END_OF_TIME_MS)
    }

    /// Subscribe to variables of every `target` object within `range` of `object_id`
    pub fn subscribe_context(
        &self,
        object_id: &str,
        target: Domain,
        range: f64,
        variable_ids: &[u8],
        begin_ms: i64,
        end_ms: i64,
    ) -> Result<()> {
        self.client.execute_context_subscribe(
            begin_ms,
            end_ms,
            object_id,
            self.domain.context_subscribe_command,
            target.get_command,
            range,
            variable_ids,
        )
    }

    pub fn unsubscribe_context(&self, object_id: &str, target: Domain) -> Result<()> {
        self.subscribe_context(object_id, target, 0.0, &[], 0, END_OF_TIME_MS)
    }

    /// Latest pushed value; `NoData` before the first push
    pub fn subscription_value(&self, object_id: &str, variable_id: u8) -> Result<CachedValue> {
        self.client
            .subscription_value(self.domain.subscribe_command, object_id, variable_id)
    }

    pub fn context_results(&self, object_id: &str, target: Domain) -> Result<ContextSnapshot> {
        self.client.context_results(
            self.domain.context_subscribe_command,
            object_id,
            target.get_command,
        )
    }
}
