use std::time::Duration;

use crate::client::consts::{
    DEFAULT_CAPACITY, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_PING_INTERVAL,
    DEFAULT_PING_TIMEOUT, TCEC_ORIGIN, TCEC_SOCKET_URL,
};

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    url: String,
    origin: String,
    ping_interval: Duration,
    ping_timeout: Duration,
    handshake_timeout: Duration,
    keep_alive_interval: Duration,
    capacity: usize,
}

pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ConnectionConfig::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.config.url = url.to_string();
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.config.origin = origin.to_string();
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    /// Upper bound on the TCP, TLS and websocket upgrade of one connection attempt.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.config.keep_alive_interval = interval;
        self
    }

    /// Number of frames buffered between the socket pump and the receive loop.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

impl Default for ConnectionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self {
            url: TCEC_SOCKET_URL.to_string(),
            origin: TCEC_ORIGIN.to_string(),
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}
