// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport configuration.
//!
//! [`TransportConfig`] is shared by every protocol handler. It controls
//! connection establishment, framing limits and how a publisher advertises
//! its listening address.
//!
//! # Environment Variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `ROSWIRE_CONNECT_TIMEOUT_MS` | Outbound connect/handshake timeout |
//! | `ROSWIRE_MAX_MESSAGE_SIZE` | Largest accepted TCPROS frame in bytes |
//! | `ROSWIRE_HOSTNAME` | Host advertised to the registry (wins over `ROSWIRE_IP`) |
//! | `ROSWIRE_IP` | Host advertised to the registry |
//!
//! # Example
//!
//! ```
//! use roswire::config::TransportConfig;
//! use std::time::Duration;
//!
//! let config = TransportConfig::default()
//!     .with_connect_timeout(Duration::from_secs(2))
//!     .with_nodelay(false);
//! assert!(config.validate().is_ok());
//! ```

use std::net::IpAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default connect/handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval at which blocked reads wake up to check for closure.
pub const DEFAULT_READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on a blocked write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum TCPROS frame size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default maximum UDPROS datagram size (Ethernet MTU).
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1500;

/// Transport configuration shared by all protocol handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    // === Connection ===
    /// Bound on connect plus header exchange for outbound connections
    pub connect_timeout: Duration,

    /// Read timeout used to poll the `done` flag while blocked
    pub read_poll_interval: Duration,

    /// Bound on a single blocked write before the transport is dropped
    pub write_timeout: Duration,

    // === Framing ===
    /// Maximum TCPROS message size in bytes (anti-OOM protection)
    pub max_message_size: usize,

    /// Maximum UDPROS datagram size in bytes, header included
    pub max_datagram_size: usize,

    /// Enable TCP_NODELAY on streaming connections
    pub nodelay: bool,

    // === Listener ===
    /// Address to bind publishers on (None = all interfaces)
    pub listen_address: Option<IpAddr>,

    /// Listen backlog for streaming publishers
    pub listen_backlog: i32,

    /// Host name or address advertised to the registry (None = discover)
    pub advertise_host: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_poll_interval: DEFAULT_READ_POLL_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            nodelay: true,
            listen_address: None,
            listen_backlog: 128,
            advertise_host: None,
        }
    }
}

impl TransportConfig {
    /// Loopback-only configuration, used by tests and single-host setups.
    pub fn loopback() -> Self {
        Self {
            listen_address: Some(IpAddr::from([127, 0, 0, 1])),
            advertise_host: Some("127.0.0.1".to_string()),
            ..Self::default()
        }
    }

    /// Create from environment variables on top of the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary key lookup (same keys as [`Self::from_env`]).
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("ROSWIRE_CONNECT_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.connect_timeout = Duration::from_millis(ms),
                Err(_) => log::warn!("[config] ignoring ROSWIRE_CONNECT_TIMEOUT_MS={}", val),
            }
        }

        if let Some(val) = lookup("ROSWIRE_MAX_MESSAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(size) => config.max_message_size = size,
                Err(_) => log::warn!("[config] ignoring ROSWIRE_MAX_MESSAGE_SIZE={}", val),
            }
        }

        // ROSWIRE_HOSTNAME takes precedence over ROSWIRE_IP
        if let Some(host) = lookup("ROSWIRE_HOSTNAME").or_else(|| lookup("ROSWIRE_IP")) {
            if !host.is_empty() {
                config.advertise_host = Some(host);
            }
        }

        config
    }

    /// Builder: set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set read poll interval
    pub fn with_read_poll_interval(mut self, interval: Duration) -> Self {
        self.read_poll_interval = interval;
        self
    }

    /// Builder: set max message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Builder: set max datagram size
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Builder: set TCP_NODELAY
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Builder: set listen address
    pub fn with_listen_address(mut self, addr: IpAddr) -> Self {
        self.listen_address = Some(addr);
        self
    }

    /// Builder: set advertised host
    pub fn with_advertise_host(mut self, host: impl Into<String>) -> Self {
        self.advertise_host = Some(host.into());
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "connect_timeout must be non-zero".into(),
            ));
        }
        if self.read_poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "read_poll_interval must be non-zero".into(),
            ));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::InvalidConfig("write_timeout must be non-zero".into()));
        }
        if self.max_message_size == 0 {
            return Err(Error::InvalidConfig(
                "max_message_size must be non-zero".into(),
            ));
        }
        if self.max_datagram_size <= crate::udpros::DATAGRAM_HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "max_datagram_size must exceed the {}-byte datagram header",
                crate::udpros::DATAGRAM_HEADER_SIZE
            )));
        }
        if self.listen_backlog <= 0 {
            return Err(Error::InvalidConfig("listen_backlog must be positive".into()));
        }
        Ok(())
    }

    /// Host string a publisher advertises for the given bound address.
    ///
    /// Resolution order: explicit `advertise_host`, the bound address when
    /// it is not unspecified, the primary interface address, loopback.
    pub(crate) fn resolve_advertise_host(&self, bound: IpAddr) -> String {
        if let Some(host) = &self.advertise_host {
            return host.clone();
        }
        if !bound.is_unspecified() {
            return bound.to_string();
        }
        match local_ip_address::local_ip() {
            Ok(ip) => ip.to_string(),
            Err(err) => {
                log::debug!("[config] local_ip lookup failed ({}), using loopback", err);
                "127.0.0.1".to_string()
            }
        }
    }
}
