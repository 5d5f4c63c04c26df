// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCPROS protocol handler.
//!
//! # Publisher side
//!
//! ```text
//! init_publisher(topic) --> AcceptLoop (one per handler)
//!                               |
//!                               v  per connection thread
//!                  read subscriber header -> validate -> reply
//!                               |
//!                               v
//!                  OUTBOUND TcpRosTransport -> Publication
//!                  receive_loop() as disconnect monitor
//! ```
//!
//! # Subscriber side
//!
//! `create_connection` connects with `connect_timeout`, exchanges headers
//! and returns an INBOUND transport; the caller runs its receive loop.

use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Weak};
use std::thread;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::listener::AcceptLoop;
use super::transport::TcpRosTransport;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::handler::bindings::check_publisher_reply;
use crate::handler::{
    check_topic, negotiate, HandlerMetrics, HandlerMetricsSnapshot, HandlerState, Lifecycle,
    PeerEndpoint, ProtocolDescriptor, ProtocolHandler, Publication, TopicBinding, TopicBindings,
    TCPROS,
};
use crate::header::{ConnectionHeader, FIELD_CALLERID, FIELD_LATCHING, FIELD_TCP_NODELAY};
use crate::message::Message;
use crate::registry::RegistryClient;
use crate::spec::{names, MsgSpec};
use crate::transport::{Direction, Transport, TransportStats};

const SUPPORTED: &[&str] = &[TCPROS];

/// Streaming protocol handler.
///
/// Dropping the handler shuts it down.
pub struct TcpRosHandler {
    inner: Arc<Inner>,
}

struct Inner {
    caller_id: String,
    config: TransportConfig,
    registry: Option<Arc<dyn RegistryClient>>,
    lifecycle: Lifecycle,
    bindings: TopicBindings,
    publications: DashMap<String, Arc<Publication>>,
    subscriptions: Mutex<Vec<Weak<TcpRosTransport>>>,
    listener: Mutex<Option<AcceptLoop>>,
    metrics: HandlerMetrics,
}

impl TcpRosHandler {
    /// Create a handler for node `caller_id` (absolute name).
    pub fn new(
        caller_id: impl Into<String>,
        config: TransportConfig,
        registry: Option<Arc<dyn RegistryClient>>,
    ) -> Result<Self> {
        let caller_id = caller_id.into();
        if !names::is_global(&caller_id) || !names::is_legal_name(&caller_id) {
            return Err(Error::InvalidName(format!(
                "caller id must be absolute: '{}'",
                caller_id
            )));
        }
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                caller_id,
                config,
                registry,
                lifecycle: Lifecycle::new(),
                bindings: TopicBindings::new(),
                publications: DashMap::new(),
                subscriptions: Mutex::new(Vec::new()),
                listener: Mutex::new(None),
                metrics: HandlerMetrics::new(),
            }),
        })
    }

    pub fn caller_id(&self) -> &str {
        &self.inner.caller_id
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    pub fn state(&self) -> HandlerState {
        self.inner.lifecycle.state()
    }

    /// Bind the message contract of `topic` (both publisher and subscriber side).
    pub fn bind_topic(&self, topic: &str, spec: &MsgSpec) -> Result<()> {
        self.inner.lifecycle.ensure_open("bind_topic")?;
        check_topic(topic)?;
        let binding = self.inner.bindings.bind(topic, TopicBinding::from_spec(spec));
        if let Some(publication) = self.publication(topic) {
            publication.rebind(Arc::clone(&binding));
        }
        log::debug!(
            "[TCPROS] bound {} to {} ({})",
            topic,
            binding.type_name,
            binding.md5sum
        );
        Ok(())
    }

    /// Publish `msg` on `topic` to every connected subscriber.
    ///
    /// Returns the number of subscribers that accepted the message.
    pub fn publish(&self, topic: &str, msg: &dyn Message) -> Result<usize> {
        self.inner.lifecycle.ensure_open("publish")?;
        let publication = self.publication(topic).ok_or_else(|| {
            Error::Resource(format!("{} has no publisher on this handler", topic))
        })?;
        let delivered = publication.publish(msg)?;
        self.inner.metrics.record_published(delivered);
        Ok(delivered)
    }

    /// Publication of `topic`, once `init_publisher` ran for it.
    pub fn publication(&self, topic: &str) -> Option<Arc<Publication>> {
        self.inner
            .publications
            .get(topic)
            .map(|p| Arc::clone(p.value()))
    }

    /// Number of subscribers connected to `topic`.
    pub fn num_subscribers(&self, topic: &str) -> usize {
        self.publication(topic)
            .map(|p| p.num_connections())
            .unwrap_or(0)
    }

    /// Listener address once a publisher was initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.listener.lock().as_ref().map(|l| l.local_addr())
    }

    /// Statistics of open subscriber connections and of every publisher
    /// connection; closed publisher connections appear as disconnected rows.
    pub fn stats(&self) -> Vec<TransportStats> {
        let mut rows: Vec<TransportStats> = self
            .inner
            .publications
            .iter()
            .flat_map(|p| p.value().stats())
            .collect();
        rows.extend(
            self.inner
                .subscriptions
                .lock()
                .iter()
                .filter_map(Weak::upgrade)
                .filter(|t| !t.is_done())
                .map(|t| t.core().stats()),
        );
        rows
    }

    pub fn metrics(&self) -> HandlerMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    fn ensure_listener(&self) -> Result<SocketAddr> {
        let mut listener = self.inner.listener.lock();
        if let Some(accept) = listener.as_ref() {
            return Ok(accept.local_addr());
        }
        let weak = Arc::downgrade(&self.inner);
        let accept = AcceptLoop::spawn(&self.inner.config, move |stream, remote| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let spawned = thread::Builder::new()
                .name("roswire-tcpros-conn".to_string())
                .spawn(move || inner.serve_subscriber(stream, remote));
            if let Err(e) = spawned {
                log::warn!("[TCPROS] cannot serve {}: {}", remote, e);
            }
        })?;
        let addr = accept.local_addr();
        *listener = Some(accept);
        Ok(addr)
    }
}

impl Inner {
    /// Publisher side of the handshake, then monitor until disconnect.
    fn serve_subscriber(self: Arc<Self>, stream: TcpStream, remote: SocketAddr) {
        let transport = match self.handshake_subscriber(stream, remote) {
            Ok(transport) => transport,
            Err(err) => {
                self.metrics.record_handshake_rejected();
                log::warn!("[TCPROS] rejected subscriber {}: {}", remote, err);
                return;
            }
        };
        self.metrics.record_subscriber_accepted();
        // Subscribers never send after their header: this read returns on
        // disconnect or close.
        let result = transport.receive_loop(&mut |_| {});
        log::debug!(
            "[TCPROS] subscriber {} ({}) left {}: {:?}",
            transport.core().endpoint_id(),
            remote,
            transport.core().name(),
            result.err()
        );
    }

    fn handshake_subscriber(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
    ) -> Result<Arc<TcpRosTransport>> {
        let config = &self.config;
        stream
            .set_read_timeout(Some(config.connect_timeout))
            .and_then(|_| stream.set_write_timeout(Some(config.connect_timeout)))
            .map_err(|e| Error::Resource(format!("configure {}: {}", remote, e)))?;

        let request = ConnectionHeader::read_from(&mut &stream, config.max_message_size)
            .map_err(|e| Error::connection(remote.to_string(), e))??;
        log::debug!("[TCPROS] subscriber header from {}: {}", remote, request);

        let accepted = self
            .lifecycle
            .ensure_open("accept")
            .and_then(|_| self.bindings.accept_subscriber(&request))
            .and_then(|(topic, _)| {
                self.publications
                    .get(&topic)
                    .map(|p| Arc::clone(p.value()))
                    .ok_or_else(|| {
                        Error::Negotiation(format!("{} is not published here", topic))
                    })
            });
        let publication = match accepted {
            Ok(publication) => publication,
            Err(err) => {
                // Best effort: the subscriber may already be gone.
                let _ = ConnectionHeader::error(err.to_string()).write_to(&mut &stream);
                return Err(err);
            }
        };

        let reply = publication
            .binding()
            .publisher_header(&self.caller_id, publication.topic())
            .with(FIELD_LATCHING, "0");
        reply
            .write_to(&mut &stream)
            .map_err(|e| Error::connection(remote.to_string(), e))?;

        let nodelay = request
            .get(FIELD_TCP_NODELAY)
            .map(|v| v == "1")
            .unwrap_or(config.nodelay);
        if let Err(e) = stream.set_nodelay(nodelay) {
            log::debug!("[TCPROS] set_nodelay on {}: {}", remote, e);
        }

        let transport = Arc::new(TcpRosTransport::new(
            stream,
            Direction::Outbound,
            publication.topic(),
            config,
        )?);
        let endpoint_id = request
            .get(FIELD_CALLERID)
            .map(str::to_string)
            .unwrap_or_else(|| remote.to_string());
        transport.core().set_endpoint_id(endpoint_id);
        publication.attach(Arc::clone(&transport) as Arc<dyn Transport>);

        // Shutdown may have raced with the handshake.
        if self.lifecycle.state() == HandlerState::Shutdown {
            transport.close();
        }
        Ok(transport)
    }

    /// Subscriber side of the handshake.
    fn connect_publisher(
        &self,
        topic: &str,
        peer_endpoint: &str,
        addr: SocketAddr,
    ) -> Result<Arc<TcpRosTransport>> {
        let config = &self.config;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
            .map_err(|e| Error::connection(peer_endpoint, e))?;
        stream
            .set_read_timeout(Some(config.connect_timeout))
            .and_then(|_| stream.set_write_timeout(Some(config.connect_timeout)))
            .and_then(|_| stream.set_nodelay(config.nodelay))
            .map_err(|e| Error::connection(peer_endpoint, e))?;

        let binding = self.bindings.get_or_wildcard(topic);
        let request = binding
            .subscriber_header(&self.caller_id, topic)
            .with(FIELD_TCP_NODELAY, if config.nodelay { "1" } else { "0" });
        request
            .write_to(&mut &stream)
            .map_err(|e| Error::connection(peer_endpoint, e))?;

        let reply = ConnectionHeader::read_from(&mut &stream, config.max_message_size)
            .map_err(|e| Error::connection(peer_endpoint, e))??;
        log::debug!("[TCPROS] publisher header from {}: {}", peer_endpoint, reply);
        check_publisher_reply(&binding, topic, &reply)?;

        let transport = TcpRosTransport::new(stream, Direction::Inbound, topic, config)?;
        let endpoint_id = reply
            .get(FIELD_CALLERID)
            .map(str::to_string)
            .unwrap_or_else(|| peer_endpoint.to_string());
        transport.core().set_endpoint_id(endpoint_id);
        Ok(Arc::new(transport))
    }
}

impl ProtocolHandler for TcpRosHandler {
    fn get_supported(&self) -> &[&'static str] {
        SUPPORTED
    }

    fn create_connection(
        &self,
        topic: &str,
        peer_endpoint: &str,
        protocols: &[&str],
    ) -> Result<Arc<dyn Transport>> {
        let inner = &self.inner;
        inner.lifecycle.ensure_open("create_connection")?;
        let protocol = negotiate(self, protocols)?;
        check_topic(topic)?;

        let addr = PeerEndpoint::parse(peer_endpoint)?.resolve(protocol, inner.registry.as_deref())?;
        let transport = match inner.connect_publisher(topic, peer_endpoint, addr) {
            Ok(transport) => transport,
            Err(err) => {
                inner.metrics.record_connection_failed();
                log::warn!("[TCPROS] {} -> {} failed: {}", topic, peer_endpoint, err);
                return Err(err);
            }
        };
        inner.metrics.record_connection_established();

        {
            let mut subscriptions = inner.subscriptions.lock();
            subscriptions.retain(|w| w.upgrade().map(|t| !t.is_done()).unwrap_or(false));
            subscriptions.push(Arc::downgrade(&transport));
        }
        if inner.lifecycle.state() == HandlerState::Shutdown {
            transport.close();
            return Err(Error::Resource(
                "handler shut down during create_connection".into(),
            ));
        }

        log::debug!(
            "[TCPROS] subscribed {} at {} (#{})",
            topic,
            peer_endpoint,
            transport.id()
        );
        Ok(transport)
    }

    fn init_publisher(&self, topic: &str, protocol: &str) -> Result<ProtocolDescriptor> {
        let inner = &self.inner;
        inner.lifecycle.ensure_open("init_publisher")?;
        if !self.supports(protocol) {
            return Err(Error::Negotiation(format!(
                "{} does not support {}",
                inner.caller_id, protocol
            )));
        }
        check_topic(topic)?;

        let bound = self.ensure_listener()?;
        let binding = match inner.bindings.get(topic) {
            Some(binding) => binding,
            None => {
                log::debug!("[TCPROS] {} published without a contract", topic);
                inner.bindings.bind(topic, TopicBinding::wildcard())
            }
        };
        inner
            .publications
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(Publication::new(topic, binding)));
        inner.lifecycle.mark_listening()?;

        let host = inner.config.resolve_advertise_host(bound.ip());
        let descriptor = ProtocolDescriptor::new(TCPROS, host, bound.port());
        log::debug!("[TCPROS] publishing {} at {}", topic, descriptor.uri());
        Ok(descriptor)
    }

    fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.lifecycle.shutdown() {
            return;
        }
        let accept = inner.listener.lock().take();
        if let Some(mut accept) = accept {
            accept.shutdown();
        }

        let publications: Vec<Arc<Publication>> = inner
            .publications
            .iter()
            .map(|p| Arc::clone(p.value()))
            .collect();
        inner.publications.clear();
        for publication in publications {
            publication.close_all();
        }

        let subscriptions = std::mem::take(&mut *inner.subscriptions.lock());
        for transport in subscriptions.iter().filter_map(Weak::upgrade) {
            transport.close();
        }
        log::debug!("[TCPROS] handler {} shut down", inner.caller_id);
    }
}

impl Drop for TcpRosHandler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TcpRosHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpRosHandler")
            .field("caller_id", &self.inner.caller_id)
            .field("state", &self.state())
            .field("publications", &self.inner.publications.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn handler(name: &str) -> TcpRosHandler {
        TcpRosHandler::new(name, TransportConfig::loopback(), None).unwrap()
    }

    #[test]
    fn test_supported() {
        let handler = handler("/node");
        assert_eq!(handler.get_supported(), &["TCPROS"]);
        assert!(handler.supports("TCPROS"));
        assert!(!handler.supports("UDPROS"));
    }

    #[test]
    fn test_rejects_relative_caller_id() {
        let err = TcpRosHandler::new("node", TransportConfig::loopback(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_negotiation_failures() {
        let handler = handler("/node");
        let err = handler
            .create_connection("/chatter", "127.0.0.1:1", &["UDPROS"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);

        let err = handler.init_publisher("/chatter", "UDPROS").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);
        assert_eq!(handler.state(), HandlerState::Created);
    }

    #[test]
    fn test_init_publisher_descriptor() {
        let handler = handler("/talker");
        let desc = handler.init_publisher("/chatter", TCPROS).unwrap();
        assert_eq!(desc.protocol, "TCPROS");
        assert_eq!(desc.host, "127.0.0.1");
        assert_eq!(Some(desc.port), handler.local_addr().map(|a| a.port()));
        assert_eq!(handler.state(), HandlerState::Listening);

        // One listener per handler.
        let desc2 = handler.init_publisher("/other", TCPROS).unwrap();
        assert_eq!(desc.port, desc2.port);
    }

    #[test]
    fn test_relative_topic_rejected() {
        let handler = handler("/talker");
        let err = handler.init_publisher("chatter", TCPROS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_connection_refused() {
        let handler = handler("/listener");
        // Bind then drop to find a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = handler
            .create_connection("/chatter", &format!("127.0.0.1:{}", port), &["TCPROS"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(handler.metrics().connections_failed, 1);
    }

    #[test]
    fn test_shutdown_is_terminal_and_idempotent() {
        let handler = handler("/talker");
        handler.init_publisher("/chatter", TCPROS).unwrap();
        handler.shutdown();
        handler.shutdown();
        assert_eq!(handler.state(), HandlerState::Shutdown);
        assert!(handler.local_addr().is_none());

        let err = handler.init_publisher("/chatter", TCPROS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        let err = handler
            .create_connection("/chatter", "127.0.0.1:1", &["TCPROS"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_publish_unknown_topic() {
        let handler = handler("/talker");
        let err = handler
            .publish("/nothing", &crate::message::RawMessage::from("x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }
}
