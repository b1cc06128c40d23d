//! Connection Manager
//!
//! Owns the single TCP socket to the simulation server.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{Result, TraciError};
use crate::protocol::{read_message, write_message};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Buffered halves of a live socket
struct Stream {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,
}

/// A half-duplex request/response channel
///
/// Every write is followed by a blocking read of exactly one reply. Once an
/// I/O or framing failure has been reported the socket is dropped and all
/// further calls return `NotConnected`. There is no reconnect.
pub struct Connection {
    stream: Option<Stream>,

    /// Largest inbound message accepted
    max_message_size: u32,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Connect to the server named in `config`
    ///
    /// Each attempt resolves the address and tries every candidate with the
    /// configured timeout. Up to `connect_retries` further attempts follow,
    /// `retry_delay` apart.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut last_error = String::from("no address attempted");
        for attempt in 0..=config.connect_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying connect to {} (attempt {} of {})",
                    config.addr(),
                    attempt + 1,
                    config.connect_retries + 1
                );
                thread::sleep(config.retry_delay());
            }

            match Self::try_connect(config) {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => last_error = e,
            }
        }

        Err(TraciError::Connection(format!(
            "could not reach {}: {}",
            config.addr(),
            last_error
        )))
    }

    fn try_connect(config: &Config) -> std::result::Result<TcpStream, String> {
        let addrs: Vec<SocketAddr> = config
            .addr()
            .to_socket_addrs()
            .map_err(|e| format!("address resolution failed: {}", e))?
            .collect();

        let mut last_error = format!("{} resolved to no addresses", config.addr());
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = format!("{}: {}", addr, e),
            }
        }
        Err(last_error)
    }

    /// Wrap an already-connected stream
    pub fn from_stream(stream: TcpStream, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        if config.nodelay {
            stream.set_nodelay(true)?;
        }

        // Calls block until the server answers
        stream.set_read_timeout(None)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        tracing::debug!("Connected to {}", peer_addr);

        Ok(Self {
            stream: Some(Stream {
                reader: BufReader::new(read_stream),
                writer: BufWriter::new(write_stream),
            }),
            max_message_size: config.max_message_size,
            peer_addr,
        })
    }

    /// Send one framed message and block for one framed reply
    ///
    /// Returns the reply body without its outer length prefix.
    pub fn send_and_receive(&mut self, message: &[u8]) -> Result<Bytes> {
        let max_message_size = self.max_message_size;
        let stream = self.stream.as_mut().ok_or(TraciError::NotConnected)?;

        let result = write_message(&mut stream.writer, message)
            .and_then(|()| read_message(&mut stream.reader, max_message_size));

        match result {
            Ok(reply) => {
                tracing::trace!(
                    "{}: sent {} bytes, received {} bytes",
                    self.peer_addr,
                    message.len(),
                    reply.len() + 4
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!("Dropping connection to {}: {}", self.peer_addr, e);
                self.close();
                Err(e)
            }
        }
    }

    /// Mark the stream as unusable after a failure detected above this layer
    pub fn abort(&mut self, reason: &TraciError) {
        if self.stream.is_some() {
            tracing::warn!("Dropping connection to {}: {}", self.peer_addr, reason);
            self.close();
        }
    }

    /// Close the socket; calling it again has no effect
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.reader.get_ref().shutdown(Shutdown::Both);
            tracing::debug!("Connection to {} closed", self.peer_addr);
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
