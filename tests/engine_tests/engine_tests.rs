//! Tests for the Command Engine
//!
//! These tests verify:
//! - Get/Set round trips against a scripted server
//! - Server refusals surface as CommandRejected with the literal description
//! - Typed getters fail with TypeMismatch instead of coercing
//! - Batching, version, step and close commands
//! - Desynchronizing failures leave the client NotConnected
//! - Concurrent callers never interleave on the wire

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;

use bytes::{BufMut, BytesMut};
use common::*;
use tracilink::domain::{LANE, ROUTE, VEHICLE};
use tracilink::network::ConnectionState;
use tracilink::protocol::constants::{ID_LIST, VAR_ADD, VAR_EDGES, VAR_POSITION, VAR_SPEED};
use tracilink::protocol::{wire, Record};
use tracilink::{Client, Command, StatusCode, TraciError, TypedValue};

// =============================================================================
// Get Tests
// =============================================================================

#[test]
fn test_get_id_list_preserves_order() {
    let server = MockServer::replying(vec![get_reply(
        ROUTE.get_command,
        ID_LIST,
        "",
        TypedValue::StringList(strings(&["r0", "r1"])),
    )]);
    let client = server.connect();

    let ids = client.domain(ROUTE).get_id_list().unwrap();
    assert_eq!(ids, strings(&["r0", "r1"]));

    let request = server.next_request();
    assert_eq!(request.len(), 1);
    assert_eq!(request[0].command_id, 0xA6);
    assert_eq!(&request[0].payload[..], &[ID_LIST, 0, 0, 0, 0]);
}

#[test]
fn test_get_with_parameters() {
    let server = MockServer::replying(vec![get_reply(
        LANE.get_command,
        0x33,
        "lane0",
        TypedValue::Double(4.5),
    )]);
    let client = server.connect();

    let value = client
        .execute_get(LANE.get_command, 0x33, "lane0", &[TypedValue::Integer(3)])
        .unwrap();
    assert_eq!(value, TypedValue::Double(4.5));

    let request = server.next_request();
    assert_eq!(
        &request[0].payload[..],
        &[0x33, 0, 0, 0, 5, b'l', b'a', b'n', b'e', b'0', 0x09, 0, 0, 0, 3]
    );
}

#[test]
fn test_repeated_get_returns_equal_values() {
    let reply = get_reply(
        ROUTE.get_command,
        VAR_EDGES,
        "r0",
        TypedValue::StringList(strings(&["e1", "e2"])),
    );
    let server = MockServer::replying(vec![reply.clone(), reply]);
    let client = server.connect();
    let routes = client.domain(ROUTE);

    let first = routes.get_string_list(VAR_EDGES, "r0").unwrap();
    let second = routes.get_string_list(VAR_EDGES, "r0").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_get_unknown_object_is_rejected_verbatim() {
    let server = MockServer::replying(vec![vec![error(VEHICLE.get_command, "unknown object")]]);
    let client = server.connect();

    let err = client.domain(VEHICLE).get_double(VAR_SPEED, "ghost").unwrap_err();
    match err {
        TraciError::CommandRejected {
            command_id,
            status,
            description,
        } => {
            assert_eq!(command_id, VEHICLE.get_command);
            assert_eq!(status, StatusCode::Error);
            assert_eq!(description, "unknown object");
        }
        other => panic!("Expected CommandRejected, got {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[test]
fn test_not_implemented_is_rejected() {
    let server = MockServer::replying(vec![vec![status(
        0xA4,
        StatusCode::NotImplemented,
        "Get Vehicle Variable: unsupported variable 0x99",
    )]]);
    let client = server.connect();

    let err = client.execute_get(0xA4, 0x99, "veh0", &[]).unwrap_err();
    assert!(matches!(
        err,
        TraciError::CommandRejected {
            status: StatusCode::NotImplemented,
            ..
        }
    ));
}

#[test]
fn test_typed_getter_mismatch() {
    let server = MockServer::replying(vec![get_reply(
        ROUTE.get_command,
        ID_LIST,
        "",
        TypedValue::Integer(2),
    )]);
    let client = server.connect();

    let err = client.domain(ROUTE).get_id_list().unwrap_err();
    match err {
        TraciError::TypeMismatch { expected, found } => {
            assert_eq!(expected, "string list");
            assert_eq!(found, "integer");
        }
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_get_success_without_result_is_protocol_error() {
    let server = MockServer::replying(vec![vec![ok(0xA6)]]);
    let client = server.connect();

    let err = client.execute_get(0xA6, ID_LIST, "", &[]).unwrap_err();
    assert!(matches!(err, TraciError::Protocol(_)), "got {:?}", err);
}

#[test]
fn test_get_result_for_other_object_is_protocol_error() {
    let server = MockServer::replying(vec![get_reply(
        0xA6,
        VAR_EDGES,
        "r9",
        TypedValue::StringList(vec![]),
    )]);
    let client = server.connect();

    let err = client.execute_get(0xA6, VAR_EDGES, "r0", &[]).unwrap_err();
    assert!(matches!(err, TraciError::Protocol(_)), "got {:?}", err);
}

#[test]
fn test_reply_without_status_keeps_connection() {
    let stray = Record::new(0x55, vec![1, 2, 3]);
    let server = MockServer::replying(vec![
        vec![stray],
        get_reply(0xA6, ID_LIST, "", TypedValue::StringList(strings(&["r0"]))),
    ]);
    let client = server.connect();

    let err = client.execute_get(0xA6, ID_LIST, "", &[]).unwrap_err();
    assert!(matches!(err, TraciError::Protocol(_)), "got {:?}", err);

    // Whole message was consumed, so the stream is still in step
    let ids = client.domain(ROUTE).get_id_list().unwrap();
    assert_eq!(ids, strings(&["r0"]));
}

// =============================================================================
// Set Tests
// =============================================================================

#[test]
fn test_set_add_route_then_duplicate() {
    let server = MockServer::replying(vec![
        vec![ok(ROUTE.set_command)],
        vec![error(ROUTE.set_command, "duplicate id")],
    ]);
    let client = server.connect();
    let routes = client.domain(ROUTE);
    let edges = TypedValue::StringList(strings(&["e1", "e2"]));

    assert!(routes.set(VAR_ADD, "r2", edges.clone()).unwrap());

    let request = server.next_request();
    let mut expected = BytesMut::new();
    expected.put_u8(VAR_ADD);
    wire::put_string(&mut expected, "r2");
    edges.encode(&mut expected);
    assert_eq!(request[0].command_id, 0xC6);
    assert_eq!(&request[0].payload[..], &expected[..]);

    let err = routes.set(VAR_ADD, "r2", edges).unwrap_err();
    match err {
        TraciError::CommandRejected { description, .. } => assert_eq!(description, "duplicate id"),
        other => panic!("Expected CommandRejected, got {:?}", other),
    }
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_batch_returns_one_result_per_command_in_order() {
    let mut reply = get_reply(0xA6, ID_LIST, "", TypedValue::StringList(strings(&["r0"])));
    reply.push(error(0xC6, "duplicate id"));
    reply.extend(get_reply(0xA4, VAR_SPEED, "veh0", TypedValue::Double(8.0)));
    let server = MockServer::replying(vec![reply]);
    let client = server.connect();

    let commands = vec![
        Command::new(0xA6, ID_LIST, "", vec![]),
        Command::new(0xC6, VAR_ADD, "r0", vec![TypedValue::StringList(vec![])]),
        Command::new(0xA4, VAR_SPEED, "veh0", vec![]),
    ];
    let results = client.execute_batch(&commands).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert_eq!(
        results[0].payload,
        Some(TypedValue::StringList(strings(&["r0"])))
    );
    assert_eq!(results[1].status, StatusCode::Error);
    assert_eq!(results[1].description, "duplicate id");
    assert_eq!(results[1].payload, None);
    assert_eq!(
        results[2].clone().into_payload().unwrap(),
        Some(TypedValue::Double(8.0))
    );

    // All three travelled in one message
    let request = server.next_request();
    let ids: Vec<u8> = request.iter().map(|r| r.command_id).collect();
    assert_eq!(ids, vec![0xA6, 0xC6, 0xA4]);
}

#[test]
fn test_batch_result_for_other_object_is_protocol_error() {
    let server = MockServer::replying(vec![get_reply(
        0xA4,
        VAR_SPEED,
        "vehB",
        TypedValue::Double(9.0),
    )]);
    let client = server.connect();

    let commands = vec![Command::new(0xA4, VAR_POSITION, "vehA", vec![])];
    let err = client.execute_batch(&commands).unwrap_err();
    assert!(matches!(err, TraciError::Protocol(_)), "got {:?}", err);
}

#[test]
fn test_batch_missing_status_is_protocol_error() {
    let server = MockServer::replying(vec![vec![ok(0xC6)]]);
    let client = server.connect();

    let commands = vec![
        Command::new(0xC6, VAR_ADD, "a", vec![TypedValue::StringList(vec![])]),
        Command::new(0xC6, VAR_ADD, "b", vec![TypedValue::StringList(vec![])]),
    ];
    let err = client.execute_batch(&commands).unwrap_err();
    assert!(matches!(err, TraciError::Protocol(_)), "got {:?}", err);
}

// =============================================================================
// Control Command Tests
// =============================================================================

#[test]
fn test_get_version() {
    let mut payload = BytesMut::new();
    payload.put_i32(21);
    wire::put_string(&mut payload, "SUMO 1.20.0");
    let server = MockServer::replying(vec![vec![ok(0x00), Record::new(0x00, payload.freeze())]]);
    let client = server.connect();

    let version = client.get_version().unwrap();
    assert_eq!(version.api_version, 21);
    assert_eq!(version.version, "SUMO 1.20.0");
}

#[test]
fn test_simulation_step_sends_target_seconds() {
    let server = MockServer::replying(vec![vec![ok(0x02)]]);
    let client = server.connect();

    client.simulation_step(2500).unwrap();

    let request = server.next_request();
    assert_eq!(request[0].command_id, 0x02);
    assert_eq!(&request[0].payload[..], &2.5f64.to_be_bytes());
    assert_eq!(client.with_subscriptions(|s| s.step()), 1);
}

#[test]
fn test_rejected_step_does_not_count() {
    let server = MockServer::replying(vec![vec![error(0x02, "simulation ended")]]);
    let client = server.connect();

    let err = client.simulation_step(0).unwrap_err();
    assert!(matches!(err, TraciError::CommandRejected { .. }));
    assert_eq!(client.with_subscriptions(|s| s.step()), 0);
}

#[test]
fn test_close_is_idempotent_and_final() {
    let server = MockServer::replying(vec![vec![ok(0x7F)]]);
    let client = server.connect();

    client.close().unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    client.close().unwrap();

    let err = client.execute_get(0xA6, ID_LIST, "", &[]).unwrap_err();
    assert!(matches!(err, TraciError::NotConnected), "got {:?}", err);
    assert_eq!(server.next_request()[0].command_id, 0x7F);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_connect_refused() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let err = Client::connect_to("127.0.0.1", port).err().unwrap();
    assert!(matches!(err, TraciError::Connection(_)), "got {:?}", err);
}

#[test]
fn test_truncated_status_record_disconnects() {
    // Status byte present, description length missing
    let server = MockServer::replying(vec![vec![Record::new(0xA6, vec![0x00])]]);
    let client = server.connect();

    let err = client.execute_get(0xA6, ID_LIST, "", &[]).unwrap_err();
    assert!(matches!(err, TraciError::Framing(_)), "got {:?}", err);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let err = client.execute_get(0xA6, ID_LIST, "", &[]).unwrap_err();
    assert!(matches!(err, TraciError::NotConnected), "got {:?}", err);
}

#[test]
fn test_server_hangup_mid_call() {
    let server = MockServer::start(vec![Step::Hangup]);
    let client = server.connect();

    let err = client.simulation_step(0).unwrap_err();
    assert!(matches!(err, TraciError::Io(_)), "got {:?}", err);

    let err = client.simulation_step(0).unwrap_err();
    assert!(matches!(err, TraciError::NotConnected), "got {:?}", err);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_calls_are_serialized() {
    const CALLERS: usize = 8;

    let reply = get_reply(0xA6, ID_LIST, "", TypedValue::StringList(strings(&["r0", "r1"])));
    let server = MockServer::replying(vec![reply; CALLERS]);
    let client = Arc::new(server.connect());

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || client.domain(ROUTE).get_id_list().unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), strings(&["r0", "r1"]));
    }

    // Each request arrived as its own intact single-command message
    for _ in 0..CALLERS {
        let request = server.next_request();
        assert_eq!(request.len(), 1);
        assert_eq!(&request[0].payload[..], &[ID_LIST, 0, 0, 0, 0]);
    }
}
