//! Engine Module
//!
//! The command engine that drives every round trip.
//!
//! ## Responsibilities
//! - Build get/set/subscribe commands and frame them
//! - Serialize round trips on the single connection
//! - Separate subscription pushes from direct results
//! - Turn status records into typed results or errors

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Config;
use crate::domain::{Domain, DomainHandle};
use crate::error::{Result, TraciError};
use crate::network::{Connection, ConnectionState};
use crate::protocol::{
    encode_message, split_records, Command, CommandResult, ControlCommand, GetResponse, Record,
    StatusCode, StatusResponse, TypedValue, VersionResponse,
};
use crate::subscription::{
    CachedValue, ContextScope, ContextSnapshot, Subscription, SubscriptionManager,
};

/// State guarded by the engine lock
struct Session {
    connection: Connection,
    subscriptions: SubscriptionManager,
}

/// Reply of one round trip, split by kind
struct Reply {
    /// Per command, in send order: status record and its result records
    results: Vec<(StatusResponse, Vec<Record>)>,

    /// Subscription pushes found anywhere in the reply
    pushes: Vec<Record>,
}

/// A TraCI client
///
/// ## Concurrency Model: one request in flight
///
/// A single mutex covers the connection and the subscription manager. Each
/// call holds it from the write until the reply's pushes are applied, so two
/// threads never interleave bytes and the cache has exactly one writer.
pub struct Client {
    config: Config,
    session: Mutex<Session>,
}

impl Client {
    /// Connect to the server named in `config`
    pub fn connect(config: Config) -> Result<Self> {
        let connection = Connection::open(&config)?;
        Ok(Self::with_connection(config, connection))
    }

    /// Connect to `host:port` with default settings otherwise
    pub fn connect_to(host: &str, port: u16) -> Result<Self> {
        Self::connect(Config::builder().host(host).port(port).build())
    }

    /// Build a client around an already-open connection
    pub fn with_connection(config: Config, connection: Connection) -> Self {
        Self {
            config,
            session: Mutex::new(Session {
                connection,
                subscriptions: SubscriptionManager::new(),
            }),
        }
    }

    /// Per-domain facade over this client
    pub fn domain(&self, domain: Domain) -> DomainHandle<'_> {
        DomainHandle::new(self, domain)
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Fetch one variable of one object
    ///
    /// Fails with `CommandRejected` when the server refuses, carrying its
    /// description unchanged.
    pub fn execute_get(
        &self,
        command_id: u8,
        variable_id: u8,
        object_id: &str,
        parameters: &[TypedValue],
    ) -> Result<TypedValue> {
        let command = Command::new(command_id, variable_id, object_id, parameters.to_vec());
        self.locked(|session| {
            let Reply { results, pushes } = session.round_trip(&[command.to_record()])?;
            session.apply_pushes(&pushes)?;

            let (status, records) = first_result(results)?;
            status.check()?;

            let record = match records.as_slice() {
                [record] => record,
                [] => {
                    return Err(TraciError::Protocol(format!(
                        "get 0x{:02x} for '{}' succeeded without a result record",
                        command_id, object_id
                    )))
                }
                more => {
                    return Err(TraciError::Protocol(format!(
                        "get 0x{:02x} for '{}' returned {} result records",
                        command_id,
                        object_id,
                        more.len()
                    )))
                }
            };

            matching_value(&command, record)
        })
    }

    /// Ask the server for its API level and version string
    pub fn get_version(&self) -> Result<VersionResponse> {
        self.locked(|session| {
            let Reply { results, pushes } =
                session.round_trip(&[ControlCommand::GetVersion.to_record()])?;
            session.apply_pushes(&pushes)?;

            let (status, records) = first_result(results)?;
            status.check()?;
            let record = records.first().ok_or_else(|| {
                TraciError::Protocol("version reply carried no result record".to_string())
            })?;
            VersionResponse::parse(record)
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Change one variable of one object
    ///
    /// `Ok(true)` on success. A refusal is an error, never `Ok(false)`.
    pub fn execute_set(
        &self,
        command_id: u8,
        variable_id: u8,
        object_id: &str,
        value: TypedValue,
    ) -> Result<bool> {
        let command = Command::new(command_id, variable_id, object_id, vec![value]);
        self.locked(|session| {
            let Reply { results, pushes } = session.round_trip(&[command.to_record()])?;
            session.apply_pushes(&pushes)?;

            let (status, _) = first_result(results)?;
            status.check()?;
            Ok(true)
        })
    }

    /// Send several commands in one message
    ///
    /// One result per command, in order. Refusals are reported inside the
    /// results rather than raised.
    pub fn execute_batch(&self, commands: &[Command]) -> Result<Vec<CommandResult>> {
        let records: Vec<Record> = commands.iter().map(Command::to_record).collect();
        self.locked(|session| {
            let Reply { results, pushes } = session.round_trip(&records)?;
            session.apply_pushes(&pushes)?;

            results
                .into_iter()
                .zip(commands)
                .map(|((status, records), command)| {
                    let payload = match records.first() {
                        Some(record) if status.status == StatusCode::Success => {
                            Some(matching_value(command, record)?)
                        }
                        _ => None,
                    };
                    Ok(CommandResult {
                        status_command_id: status.command_id,
                        status: status.status,
                        description: status.description,
                        payload,
                    })
                })
                .collect()
        })
    }

    /// Advance the simulation
    ///
    /// `target_ms` of 0 performs a single step. Pushes for every active
    /// subscription arrive with this reply.
    pub fn simulation_step(&self, target_ms: i64) -> Result<()> {
        let step = ControlCommand::SimulationStep { target_ms };
        self.locked(|session| {
            let Reply { results, pushes } = session.round_trip(&[step.to_record()])?;
            let (status, _) = first_result(results)?;

            if status.status == StatusCode::Success {
                session
                    .subscriptions
                    .advance_step((target_ms > 0).then_some(target_ms));
            }
            session.apply_pushes(&pushes)?;
            status.check()
        })
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Subscribe to variables of one object
    ///
    /// Values arrive later, attached to replies. An empty `variable_ids`
    /// unsubscribes.
    pub fn execute_subscribe(
        &self,
        begin_ms: i64,
        end_ms: i64,
        object_id: &str,
        command_id: u8,
        variable_ids: &[u8],
    ) -> Result<()> {
        self.subscribe(Subscription {
            object_id: object_id.to_string(),
            command_id,
            variable_ids: variable_ids.to_vec(),
            begin_ms,
            end_ms,
            context: None,
        })
    }

    /// Subscribe to variables of every `domain` object within `range` of one object
    #[allow(clippy::too_many_arguments)]
    pub fn execute_context_subscribe(
        &self,
        begin_ms: i64,
        end_ms: i64,
        object_id: &str,
        command_id: u8,
        domain: u8,
        range: f64,
        variable_ids: &[u8],
    ) -> Result<()> {
        self.subscribe(Subscription {
            object_id: object_id.to_string(),
            command_id,
            variable_ids: variable_ids.to_vec(),
            begin_ms,
            end_ms,
            context: Some(ContextScope { domain, range }),
        })
    }

    fn subscribe(&self, subscription: Subscription) -> Result<()> {
        let record = subscription.to_record()?;
        self.locked(|session| {
            let Reply {
                results,
                mut pushes,
            } = session.round_trip(&[record])?;
            let (status, attached) = first_result(results)?;

            // Register before applying: the reply already carries the first values.
            // Outside the standard bands those are only recognisable from here.
            if status.status == StatusCode::Success {
                session.subscriptions.register(subscription);
                pushes.extend(attached);
            }
            session.apply_pushes(&pushes)?;
            status.check()
        })
    }

    /// Latest pushed value of a subscribed variable
    pub fn subscription_value(
        &self,
        command_id: u8,
        object_id: &str,
        variable_id: u8,
    ) -> Result<CachedValue> {
        self.with_subscriptions(|subs| subs.value(command_id, object_id, variable_id).cloned())
    }

    /// Latest push of a context subscription
    pub fn context_results(
        &self,
        command_id: u8,
        object_id: &str,
        domain: u8,
    ) -> Result<ContextSnapshot> {
        self.with_subscriptions(|subs| {
            subs.context_results(command_id, object_id, domain)
                .cloned()
        })
    }

    /// Read-only access to the subscription state
    pub fn with_subscriptions<R>(&self, f: impl FnOnce(&SubscriptionManager) -> R) -> R {
        f(&self.session.lock().subscriptions)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// End the session
    ///
    /// Sends the close command when still connected, then drops the socket.
    /// Calling it again has no effect.
    pub fn close(&self) -> Result<()> {
        let mut session = self.session.lock();
        if !session.connection.is_connected() {
            return Ok(());
        }

        let result = session
            .round_trip(&[ControlCommand::Close.to_record()])
            .and_then(|reply| first_result(reply.results))
            .and_then(|(status, _)| status.check());
        session.connection.close();
        result
    }

    pub fn state(&self) -> ConnectionState {
        self.session.lock().connection.state()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one exchange under the engine lock
    ///
    /// Errors that may leave the byte stream out of step drop the connection,
    /// so later calls fail with `NotConnected` instead of misreading bytes.
    fn locked<T>(&self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut session = self.session.lock();
        let result = f(&mut *session);
        if let Err(e) = &result {
            if e.is_desync() {
                session.connection.abort(e);
            }
        }
        result
    }
}

/// Value of a get result record, which must echo the variable and object asked for
fn matching_value(command: &Command, record: &Record) -> Result<TypedValue> {
    let response = GetResponse::parse(record)?;
    if response.variable_id != command.variable_id || response.object_id != command.object_id {
        return Err(TraciError::Protocol(format!(
            "asked for 0x{:02x} of '{}', got 0x{:02x} of '{}'",
            command.variable_id, command.object_id, response.variable_id, response.object_id
        )));
    }
    Ok(response.value)
}

fn first_result(
    results: Vec<(StatusResponse, Vec<Record>)>,
) -> Result<(StatusResponse, Vec<Record>)> {
    results
        .into_iter()
        .next()
        .ok_or_else(|| TraciError::Protocol("reply carried no status record".to_string()))
}

impl Session {
    /// Frame, send, receive and sort one exchange
    fn round_trip(&mut self, records: &[Record]) -> Result<Reply> {
        let expected: Vec<u8> = records.iter().map(|r| r.command_id).collect();
        let message = encode_message(records);

        let body: Bytes = self.connection.send_and_receive(&message)?;
        let inbound = split_records(&body)?;

        tracing::trace!(
            "Round trip: {} records out ({:02x?}), {} records in",
            records.len(),
            expected,
            inbound.len()
        );

        self.sort_reply(&expected, inbound)
    }

    /// Group reply records under the status record of the command they answer
    fn sort_reply(&self, expected: &[u8], inbound: Vec<Record>) -> Result<Reply> {
        let mut results: Vec<(StatusResponse, Vec<Record>)> = Vec::with_capacity(expected.len());
        let mut pushes = Vec::new();

        for record in inbound {
            if self.subscriptions.is_push(record.command_id) {
                pushes.push(record);
                continue;
            }

            let next_expected = expected.get(results.len()).copied();
            if Some(record.command_id) == next_expected {
                results.push((StatusResponse::parse(&record)?, Vec::new()));
                continue;
            }

            match results.last_mut() {
                Some((_, attached)) => attached.push(record),
                None => {
                    return Err(TraciError::Protocol(format!(
                        "expected status for 0x{:02x}, got record 0x{:02x}",
                        expected.first().copied().unwrap_or_default(),
                        record.command_id
                    )))
                }
            }
        }

        if results.len() != expected.len() {
            return Err(TraciError::Protocol(format!(
                "sent {} commands, received {} status records",
                expected.len(),
                results.len()
            )));
        }

        Ok(Reply { results, pushes })
    }

    fn apply_pushes(&mut self, pushes: &[Record]) -> Result<()> {
        for push in pushes {
            self.subscriptions.apply_push(push)?;
        }
        Ok(())
    }
}
