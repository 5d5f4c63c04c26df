// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol handlers.
//!
//! A protocol handler implements one or more wire protocols (`TCPROS`,
//! `UDPROS`). It negotiates a protocol from a caller-ordered candidate
//! list, opens subscriber connections, and binds publisher listeners.
//!
//! # Lifecycle
//!
//! ```text
//!   CREATED --init_publisher()--> LISTENING
//!      |                              |
//!      +---------shutdown()-----------+--> SHUTDOWN (terminal)
//! ```
//!
//! `create_connection` is allowed in CREATED and LISTENING. Every operation
//! except `shutdown` fails with [`Error::Resource`] once shut down.
//!
//! # Modules
//!
//! - `bindings` - Per-topic message contracts and handshake validation
//! - `endpoint` - Peer endpoint parsing and resolution
//! - `metrics` - Per-handler counters
//! - `publication` - Publisher-side fan-out of one topic
//! - `set` - Ordered handler collection with negotiation

pub mod bindings;
pub mod endpoint;
pub mod metrics;
pub mod publication;
pub mod set;

pub use bindings::{TopicBinding, TopicBindings};
pub use endpoint::PeerEndpoint;
pub use metrics::{HandlerMetrics, HandlerMetricsSnapshot};
pub use publication::Publication;
pub use set::HandlerSet;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::spec::names;
use crate::transport::Transport;

/// Streaming protocol name.
pub const TCPROS: &str = "TCPROS";

/// Datagram protocol name.
pub const UDPROS: &str = "UDPROS";

// ============================================================================
// Protocol descriptor
// ============================================================================

/// Advertisable description of a bound publisher: `(protocol, host, port)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolDescriptor {
    /// Protocol name (`TCPROS`, `UDPROS`)
    pub protocol: String,
    /// Host subscribers should connect to
    pub host: String,
    /// Port subscribers should connect to
    pub port: u16,
}

impl ProtocolDescriptor {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// `tcpros://host:port` form accepted by [`PeerEndpoint::parse`].
    pub fn uri(&self) -> String {
        format!(
            "{}://{}:{}",
            self.protocol.to_ascii_lowercase(),
            self.host,
            self.port
        )
    }
}

impl fmt::Display for ProtocolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.protocol, self.host, self.port)
    }
}

// ============================================================================
// Handler contract
// ============================================================================

/// A provider of one or more wire protocols.
///
/// Implementations are shared between the threads that open connections,
/// the accept loops they own, and whoever calls [`ProtocolHandler::shutdown`].
pub trait ProtocolHandler: Send + Sync {
    /// Supported protocol names, in a stable order.
    fn get_supported(&self) -> &[&'static str];

    /// Whether `protocol` is one of [`ProtocolHandler::get_supported`].
    fn supports(&self, protocol: &str) -> bool {
        self.get_supported().iter().any(|p| *p == protocol)
    }

    /// Open a subscriber connection to `peer_endpoint` for `topic`.
    ///
    /// The first protocol in `protocols` (caller order) this handler
    /// supports is used. Fails with [`Error::Negotiation`] when none is
    /// supported and [`Error::Connection`] when the peer cannot be reached.
    fn create_connection(
        &self,
        topic: &str,
        peer_endpoint: &str,
        protocols: &[&str],
    ) -> Result<Arc<dyn Transport>>;

    /// Bind publisher state for `topic` and return its descriptor.
    ///
    /// Fails with [`Error::Negotiation`] when `protocol` is unsupported and
    /// [`Error::Resource`] when the listener cannot be bound.
    fn init_publisher(&self, topic: &str, protocol: &str) -> Result<ProtocolDescriptor>;

    /// Release every resource. Idempotent, never fails.
    fn shutdown(&self);
}

impl fmt::Debug for dyn ProtocolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolHandler")
            .field("supported", &self.get_supported())
            .finish()
    }
}

/// First candidate, in caller order, that `handler` supports.
pub fn negotiate<'a>(handler: &dyn ProtocolHandler, candidates: &[&'a str]) -> Result<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|c| handler.supports(c))
        .ok_or_else(|| {
            Error::Negotiation(format!(
                "none of {:?} is supported (supported: {:?})",
                candidates,
                handler.get_supported()
            ))
        })
}

/// Reject relative or malformed topic names.
pub(crate) fn check_topic(topic: &str) -> Result<()> {
    if topic.len() > 1 && names::is_global(topic) && names::is_legal_name(topic) {
        Ok(())
    } else {
        Err(Error::InvalidName(format!(
            "topic must be an absolute graph name: '{}'",
            topic
        )))
    }
}

// ============================================================================
// Handler state
// ============================================================================

/// Lifecycle state of a protocol handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerState {
    Created,
    Listening,
    Shutdown,
}

/// State machine shared by concrete handlers.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: Mutex<HandlerState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(HandlerState::Created),
        }
    }

    pub(crate) fn state(&self) -> HandlerState {
        *self.state.lock()
    }

    /// Fail with [`Error::Resource`] once shut down.
    pub(crate) fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.state() == HandlerState::Shutdown {
            return Err(Error::Resource(format!(
                "{} called after handler shutdown",
                operation
            )));
        }
        Ok(())
    }

    /// CREATED -> LISTENING. No-op when already listening.
    pub(crate) fn mark_listening(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            HandlerState::Shutdown => Err(Error::Resource(
                "init_publisher called after handler shutdown".into(),
            )),
            _ => {
                *state = HandlerState::Listening;
                Ok(())
            }
        }
    }

    /// Enter SHUTDOWN. Returns `true` for the call that made the transition.
    pub(crate) fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if *state == HandlerState::Shutdown {
            return false;
        }
        *state = HandlerState::Shutdown;
        true
    }
}

// ============================================================================
// Base handler
// ============================================================================

/// Handler that supports nothing.
///
/// Placeholder for nodes without a transport, and the reference for the
/// contract's failure modes: both connection operations report
/// [`Error::NotImplemented`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseProtocolHandler;

impl BaseProtocolHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ProtocolHandler for BaseProtocolHandler {
    fn get_supported(&self) -> &[&'static str] {
        &[]
    }

    fn create_connection(
        &self,
        _topic: &str,
        _peer_endpoint: &str,
        _protocols: &[&str],
    ) -> Result<Arc<dyn Transport>> {
        Err(Error::NotImplemented("create_connection"))
    }

    fn init_publisher(&self, _topic: &str, _protocol: &str) -> Result<ProtocolDescriptor> {
        Err(Error::NotImplemented("init_publisher"))
    }

    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_base_handler_supports_nothing() {
        let handler = BaseProtocolHandler::new();
        assert!(!handler.supports("TCPROS"));
        assert!(!handler.supports("UDPROS"));
        assert!(handler.get_supported().is_empty());
    }

    #[test]
    fn test_base_handler_operations_are_abstract() {
        let handler = BaseProtocolHandler::new();
        let err = handler
            .create_connection("/topic", "http://localhost:1234", &["TCPROS"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);

        let err = handler.init_publisher("/topic", "TCPROS").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);

        // Shutdown is a no-op and may be repeated.
        handler.shutdown();
        handler.shutdown();
    }

    #[test]
    fn test_descriptor_forms() {
        let desc = ProtocolDescriptor::new(TCPROS, "10.0.0.7", 41234);
        assert_eq!(desc.uri(), "tcpros://10.0.0.7:41234");
        assert_eq!(desc.to_string(), "TCPROS 10.0.0.7 41234");
    }

    struct Fixed(&'static [&'static str]);

    impl ProtocolHandler for Fixed {
        fn get_supported(&self) -> &[&'static str] {
            self.0
        }
        fn create_connection(&self, _: &str, _: &str, _: &[&str]) -> Result<Arc<dyn Transport>> {
            Err(Error::NotImplemented("create_connection"))
        }
        fn init_publisher(&self, _: &str, _: &str) -> Result<ProtocolDescriptor> {
            Err(Error::NotImplemented("init_publisher"))
        }
        fn shutdown(&self) {}
    }

    #[test]
    fn test_negotiate_follows_caller_order() {
        let handler = Fixed(&[TCPROS, UDPROS]);
        assert_eq!(negotiate(&handler, &["UDPROS", "TCPROS"]).unwrap(), "UDPROS");
        assert_eq!(negotiate(&handler, &["SHMROS", "TCPROS"]).unwrap(), "TCPROS");

        let err = negotiate(&handler, &["SHMROS"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);
        let err = negotiate(&handler, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);
    }

    #[test]
    fn test_check_topic() {
        assert!(check_topic("/chatter").is_ok());
        assert!(check_topic("/ns/chatter").is_ok());
        assert!(check_topic("chatter").is_err());
        assert!(check_topic("/").is_err());
        assert!(check_topic("").is_err());
    }

    #[test]
    fn test_lifecycle() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), HandlerState::Created);
        assert!(lifecycle.ensure_open("create_connection").is_ok());

        lifecycle.mark_listening().unwrap();
        lifecycle.mark_listening().unwrap();
        assert_eq!(lifecycle.state(), HandlerState::Listening);

        assert!(lifecycle.shutdown());
        assert!(!lifecycle.shutdown());
        assert_eq!(
            lifecycle.ensure_open("create_connection").unwrap_err().kind(),
            ErrorKind::Resource
        );
        assert!(lifecycle.mark_listening().is_err());
    }
}
