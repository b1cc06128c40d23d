//! Configuration for tracilink
//!
//! Centralized client configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, TraciError};

/// Default TraCI port
pub const DEFAULT_PORT: u16 = 8813;

/// Main configuration for a TraCI client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Host running the simulation server
    pub host: String,

    /// TCP port of the simulation server
    pub port: u16,

    // -------------------------------------------------------------------------
    // Connect Configuration
    // -------------------------------------------------------------------------
    /// Timeout for each connect attempt (milliseconds)
    pub connect_timeout_ms: u64,

    /// Extra connect attempts after the first one fails
    pub connect_retries: u32,

    /// Pause between connect attempts (milliseconds)
    pub retry_delay_ms: u64,

    // -------------------------------------------------------------------------
    // Socket Configuration
    // -------------------------------------------------------------------------
    /// Disable Nagle's algorithm
    pub nodelay: bool,

    /// Largest inbound message accepted, outer length prefix included (bytes)
    pub max_message_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
            connect_retries: 0,
            retry_delay_ms: 1000,
            nodelay: true,
            max_message_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `host:port` string used for address resolution
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject settings that can never produce a working connection
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(TraciError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(TraciError::Config("port must not be 0".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(TraciError::Config(
                "connect timeout must be positive".to_string(),
            ));
        }
        if self.max_message_size < 4 {
            return Err(TraciError::Config(format!(
                "max message size {} cannot hold a length prefix",
                self.max_message_size
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the per-attempt connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the number of extra connect attempts
    pub fn connect_retries(mut self, retries: u32) -> Self {
        self.config.connect_retries = retries;
        self
    }

    /// Set the delay between connect attempts (in milliseconds)
    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the maximum inbound message size (in bytes)
    pub fn max_message_size(mut self, size: u32) -> Self {
        self.config.max_message_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
