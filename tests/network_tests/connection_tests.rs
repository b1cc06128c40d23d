//! Tests for the Connection Manager
//!
//! These tests verify:
//! - Connect failures surface as connection errors
//! - One write is answered by exactly one framed read
//! - A broken stream moves the connection to Disconnected for good
//! - close() is idempotent

#[path = "../common/mod.rs"]
mod common;

use std::net::TcpListener;

use common::{MockServer, Step};
use tracilink::config::Config;
use tracilink::network::{Connection, ConnectionState};
use tracilink::protocol::{encode_message, split_records, Record};
use tracilink::TraciError;

fn closed_port() -> u16 {
    // Bind then release: nothing listens there afterwards
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// =============================================================================
// Connect Tests
// =============================================================================

#[test]
fn test_connect_refused_is_connection_error() {
    let config = Config::builder()
        .host("127.0.0.1")
        .port(closed_port())
        .connect_timeout_ms(500)
        .build();

    let err = Connection::open(&config).err().unwrap();
    assert!(matches!(err, TraciError::Connection(_)), "got {:?}", err);
}

#[test]
fn test_connect_retries_then_fails() {
    let config = Config::builder()
        .host("127.0.0.1")
        .port(closed_port())
        .connect_timeout_ms(200)
        .connect_retries(2)
        .retry_delay_ms(10)
        .build();

    let err = Connection::open(&config).err().unwrap();
    assert!(matches!(err, TraciError::Connection(_)));
}

#[test]
fn test_invalid_config_is_rejected_before_connecting() {
    let config = Config::builder().host("").build();
    let err = Connection::open(&config).err().unwrap();
    assert!(matches!(err, TraciError::Config(_)), "got {:?}", err);

    let config = Config::builder().port(0).build();
    assert!(matches!(config.validate(), Err(TraciError::Config(_))));

    let config = Config::builder().max_message_size(2).build();
    assert!(matches!(config.validate(), Err(TraciError::Config(_))));
}

#[test]
fn test_connect_sets_state() {
    let server = MockServer::replying(vec![]);
    let connection = Connection::open(&server.config()).unwrap();
    assert_eq!(connection.state(), ConnectionState::Connected);
    assert!(connection.peer_addr().starts_with("127.0.0.1:"));
}

// =============================================================================
// Send/Receive Tests
// =============================================================================

#[test]
fn test_send_and_receive_returns_reply_body() {
    let server = MockServer::replying(vec![vec![Record::new(0x00, vec![0x00, 0, 0, 0, 0])]]);
    let mut connection = Connection::open(&server.config()).unwrap();

    let message = encode_message(&[Record::new(0x00, vec![])]);
    let body = connection.send_and_receive(&message).unwrap();

    assert_eq!(
        split_records(&body).unwrap(),
        vec![Record::new(0x00, vec![0x00, 0, 0, 0, 0])]
    );
    assert_eq!(server.next_request(), vec![Record::new(0x00, vec![])]);
}

#[test]
fn test_hangup_disconnects_then_not_connected() {
    let server = MockServer::start(vec![Step::Hangup]);
    let mut connection = Connection::open(&server.config()).unwrap();
    let message = encode_message(&[Record::new(0x00, vec![])]);

    let err = connection.send_and_receive(&message).unwrap_err();
    assert!(err.is_desync(), "got {:?}", err);
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    let err = connection.send_and_receive(&message).unwrap_err();
    assert!(matches!(err, TraciError::NotConnected), "got {:?}", err);
}

#[test]
fn test_truncated_reply_is_framing_error() {
    // Declares 50 bytes, delivers 9, then the server hangs up
    let server = MockServer::start(vec![Step::Raw(vec![0, 0, 0, 50, 0, 0, 0, 5, 0x00])]);
    let mut connection = Connection::open(&server.config()).unwrap();
    let message = encode_message(&[Record::new(0x00, vec![])]);

    let err = connection.send_and_receive(&message).unwrap_err();
    assert!(matches!(err, TraciError::Framing(_)), "got {:?}", err);
    assert!(!connection.is_connected());
}

#[test]
fn test_close_is_idempotent() {
    let server = MockServer::replying(vec![]);
    let mut connection = Connection::open(&server.config()).unwrap();

    connection.close();
    connection.close();
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    let err = connection
        .send_and_receive(&encode_message(&[]))
        .unwrap_err();
    assert!(matches!(err, TraciError::NotConnected));
}
