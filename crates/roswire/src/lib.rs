// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # roswire - Transport and protocol negotiation for ROS-style pub/sub
//!
//! Nodes exchange typed messages over named topics. A node asks the
//! registry for the peers of a topic, negotiates a wire protocol with each
//! of them through a [`ProtocolHandler`], and moves messages over the
//! resulting [`Transport`] until it closes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roswire::{
//!     link, HandlerSet, MsgSpec, RawMessage, Result, StaticRegistry, TcpRosHandler,
//!     TransportConfig,
//! };
//!
//! fn main() -> Result<()> {
//!     let registry = Arc::new(StaticRegistry::new());
//!     let spec = MsgSpec::parse("string data", "std_msgs")?;
//!
//!     let talker = Arc::new(TcpRosHandler::new("/talker", TransportConfig::default(), None)?);
//!     talker.bind_topic("/chatter", &spec)?;
//!     let publishers = HandlerSet::new().with(talker.clone());
//!     link::advertise(registry.as_ref(), &publishers, "/chatter", "std_msgs/String", "TCPROS")?;
//!
//!     let listener = Arc::new(TcpRosHandler::new("/listener", TransportConfig::default(), None)?);
//!     listener.bind_topic("/chatter", &spec)?;
//!     let subscribers = HandlerSet::new().with(listener);
//!     let linked = link::subscribe(registry.as_ref(), &subscribers, "/chatter", &["TCPROS"])?;
//!     let _subscription = link::Subscription::start(linked.transports)?;
//!
//!     talker.publish("/chatter", &RawMessage::from("hello"))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  link: subscribe / advertise / Subscription        registry         |
//! +---------------------------------------------------------------------+
//! |  handler: ProtocolHandler, HandlerSet, TopicBinding, Publication    |
//! |      tcpros: TcpRosHandler            udpros: UdpRosHandler         |
//! +---------------------------------------------------------------------+
//! |  transport: Transport, TransportCore, DeadTransport                 |
//! |  header: connection header           spec: MsgSpec / SrvSpec / md5  |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`transport`] - Transport abstraction, statistics and closure
//! - [`handler`] - Protocol negotiation contract
//! - [`tcpros`] / [`udpros`] - Concrete wire protocols
//! - [`spec`] - Message and service specifications
//! - [`registry`] - Registry client boundary
//! - [`link`] - Registry-driven subscribe and advertise

/// Transport configuration (timeouts, limits, addresses).
pub mod config;
/// Error type shared by every module.
pub mod error;
/// Protocol handler contract and shared negotiation helpers.
pub mod handler;
/// Connection header codec.
pub mod header;
/// Registry-driven topic wiring.
pub mod link;
/// Message serialization seam.
pub mod message;
/// Registry client boundary.
pub mod registry;
/// Message and service specifications.
pub mod spec;
/// TCPROS streaming transport.
pub mod tcpros;
/// Transport abstraction and lifecycle.
pub mod transport;
/// UDPROS datagram transport.
pub mod udpros;

pub use config::TransportConfig;
pub use error::{Error, ErrorKind, Result};
pub use handler::{
    BaseProtocolHandler, HandlerSet, HandlerState, PeerEndpoint, ProtocolDescriptor,
    ProtocolHandler, Publication, TopicBinding, TCPROS, UDPROS,
};
pub use header::ConnectionHeader;
pub use link::{Delivery, Linked, Subscription};
pub use message::{Message, RawMessage};
pub use registry::{RegistryClient, StaticRegistry, TopicInfo};
pub use spec::{load_msg_from_str, load_srv_from_str, Constant, MsgSpec, Spec, SrvSpec};
pub use tcpros::{TcpRosHandler, TcpRosTransport};
pub use transport::{
    DeadTransport, Direction, GenericTransport, Transport, TransportCore, TransportStats,
};
pub use udpros::{UdpRosHandler, UdpRosTransport};

/// roswire version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
