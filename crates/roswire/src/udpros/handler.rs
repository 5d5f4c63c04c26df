// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPROS protocol handler.
//!
//! The publisher side binds one socket per handler. Its receive thread
//! answers `HANDSHAKE` datagrams and drops connections on `ERR`. Data sent
//! back by a subscriber is discarded: topic traffic flows one way.
//!
//! The subscriber side binds an ephemeral socket per connection, sends its
//! connection header in a `HANDSHAKE` datagram and waits up to
//! `connect_timeout` for the reply carrying the assigned connection id.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};

use super::datagram::{DatagramHeader, Op};
use super::transport::UdpRosTransport;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::handler::bindings::check_publisher_reply;
use crate::handler::{
    check_topic, negotiate, HandlerMetrics, HandlerMetricsSnapshot, HandlerState, Lifecycle,
    PeerEndpoint, ProtocolDescriptor, ProtocolHandler, Publication, TopicBinding, TopicBindings,
    UDPROS,
};
use crate::header::{ConnectionHeader, FIELD_CALLERID, FIELD_CONNECTION_ID, FIELD_LATCHING};
use crate::message::Message;
use crate::registry::RegistryClient;
use crate::spec::{names, MsgSpec};
use crate::tcpros::codec::is_timeout;
use crate::transport::{Transport, TransportStats};

const SUPPORTED: &[&str] = &[UDPROS];

/// Datagram protocol handler.
///
/// Dropping the handler shuts it down.
pub struct UdpRosHandler {
    inner: Arc<Inner>,
}

struct Inner {
    caller_id: String,
    config: TransportConfig,
    registry: Option<Arc<dyn RegistryClient>>,
    lifecycle: Lifecycle,
    bindings: TopicBindings,
    publications: DashMap<String, Arc<Publication>>,
    /// Publisher-side connections by connection id
    connections: DashMap<u32, Arc<UdpRosTransport>>,
    next_conn_id: AtomicU32,
    subscriptions: Mutex<Vec<Weak<UdpRosTransport>>>,
    responder: Mutex<Option<Responder>>,
    metrics: HandlerMetrics,
}

/// Publisher socket and its receive thread.
struct Responder {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Responder {
    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            // The thread notices within one read_poll_interval.
            if handle.join().is_err() {
                log::warn!("[UDPROS] receive thread panicked");
            }
            log::debug!("[UDPROS] stopped listening on {}", self.local_addr);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind_socket(ip: IpAddr) -> std::io::Result<UdpSocket> {
    let addr = SocketAddr::new(ip, 0);
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

impl UdpRosHandler {
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
                connections: DashMap::new(),
                next_conn_id: AtomicU32::new(1),
                subscriptions: Mutex::new(Vec::new()),
                responder: Mutex::new(None),
                metrics: HandlerMetrics::new(),
            }),
        })
    }

    pub fn caller_id(&self) -> &str {
        &self.inner.caller_id
    }

    pub fn state(&self) -> HandlerState {
        self.inner.lifecycle.state()
    }

    /// Bind the message contract of `topic`.
    pub fn bind_topic(&self, topic: &str, spec: &MsgSpec) -> Result<()> {
        self.inner.lifecycle.ensure_open("bind_topic")?;
        check_topic(topic)?;
        let binding = self.inner.bindings.bind(topic, TopicBinding::from_spec(spec));
        if let Some(publication) = self.publication(topic) {
            publication.rebind(binding);
        }
        Ok(())
    }

    /// Publish `msg` on `topic` to every connected subscriber.
    pub fn publish(&self, topic: &str, msg: &dyn Message) -> Result<usize> {
        self.inner.lifecycle.ensure_open("publish")?;
        let publication = self.publication(topic).ok_or_else(|| {
            Error::Resource(format!("{} has no publisher on this handler", topic))
        })?;
        let delivered = publication.publish(msg)?;
        self.inner.metrics.record_published(delivered);
        Ok(delivered)
    }

    pub fn publication(&self, topic: &str) -> Option<Arc<Publication>> {
        self.inner
            .publications
            .get(topic)
            .map(|p| Arc::clone(p.value()))
    }

    pub fn num_subscribers(&self, topic: &str) -> usize {
        self.publication(topic)
            .map(|p| p.num_connections())
            .unwrap_or(0)
    }

    /// Publisher socket address once a publisher was initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.responder.lock().as_ref().map(|r| r.local_addr)
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

    fn ensure_responder(&self) -> Result<SocketAddr> {
        let mut responder = self.inner.responder.lock();
        if let Some(r) = responder.as_ref() {
            return Ok(r.local_addr);
        }

        let config = &self.inner.config;
        let ip = config
            .listen_address
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let resource = |what: &str, e: std::io::Error| Error::Resource(format!("{}: {}", what, e));
        let socket = bind_socket(ip).map_err(|e| resource("bind UDPROS socket", e))?;
        socket
            .set_read_timeout(Some(config.read_poll_interval))
            .map_err(|e| resource("configure UDPROS socket", e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| resource("socket address", e))?;
        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let socket = Arc::clone(&socket);
            let running = Arc::clone(&running);
            let weak = Arc::downgrade(&self.inner);
            thread::Builder::new()
                .name("roswire-udpros-recv".to_string())
                .spawn(move || Inner::run_responder(weak, socket, running))
                .map_err(|e| resource("spawn receive thread", e))?
        };

        log::debug!("[UDPROS] listening on {}", local_addr);
        *responder = Some(Responder {
            socket,
            local_addr,
            running,
            thread: Some(thread),
        });
        Ok(local_addr)
    }
}

impl Inner {
    fn run_responder(weak: Weak<Inner>, socket: Arc<UdpSocket>, running: Arc<AtomicBool>) {
        let mut buf = vec![0u8; 64 * 1024];
        while running.load(Ordering::Acquire) {
            let (n, from) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if is_timeout(&e) || e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // ICMP errors from vanished subscribers surface here.
                    log::trace!("[UDPROS] recv error: {}", e);
                    continue;
                }
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match DatagramHeader::decode(&buf[..n]) {
                Ok((header, payload)) => inner.handle_datagram(&socket, header, payload, from),
                Err(err) => log::trace!("[UDPROS] dropping datagram from {}: {}", from, err),
            }
        }
    }

    fn handle_datagram(
        &self,
        socket: &Arc<UdpSocket>,
        header: DatagramHeader,
        payload: &[u8],
        from: SocketAddr,
    ) {
        match header.op {
            Op::Handshake => self.handle_handshake(socket, payload, from),
            Op::Err => {
                if let Some((_, transport)) = self.connections.remove(&header.conn_id) {
                    log::debug!(
                        "[UDPROS] subscriber {} closed conn {}",
                        transport.core().endpoint_id(),
                        header.conn_id
                    );
                    transport.close();
                }
            }
            Op::Data0 | Op::DataN => log::trace!(
                "[UDPROS] discarding {} bytes from subscriber {} (conn {})",
                payload.len(),
                from,
                header.conn_id
            ),
            Op::Ping => {}
        }
    }

    fn handle_handshake(&self, socket: &Arc<UdpSocket>, payload: &[u8], from: SocketAddr) {
        match self.accept_subscriber(socket, payload, from) {
            Ok((reply, conn_id)) => {
                let datagram = DatagramHeader::new(conn_id, Op::Handshake, 0, 0).encode(&reply.encode());
                if let Err(e) = socket.send_to(&datagram, from) {
                    log::warn!("[UDPROS] handshake reply to {} failed: {}", from, e);
                    if let Some((_, transport)) = self.connections.remove(&conn_id) {
                        transport.close();
                    }
                    return;
                }
                self.metrics.record_subscriber_accepted();
            }
            Err(err) => {
                self.metrics.record_handshake_rejected();
                log::warn!("[UDPROS] rejected subscriber {}: {}", from, err);
                let reply = ConnectionHeader::error(err.to_string());
                let datagram = DatagramHeader::new(0, Op::Err, 0, 0).encode(&reply.encode());
                let _ = socket.send_to(&datagram, from);
            }
        }
    }

    fn accept_subscriber(
        &self,
        socket: &Arc<UdpSocket>,
        payload: &[u8],
        from: SocketAddr,
    ) -> Result<(ConnectionHeader, u32)> {
        self.lifecycle.ensure_open("accept")?;
        self.connections.retain(|_, transport| !transport.is_done());
        let request = ConnectionHeader::read_from(&mut &payload[..], payload.len())
            .map_err(|e| Error::InvalidHeader(e.to_string()))??;
        let (topic, binding) = self.bindings.accept_subscriber(&request)?;
        let publication = self
            .publications
            .get(&topic)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| Error::Negotiation(format!("{} is not published here", topic)))?;

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let transport = Arc::new(UdpRosTransport::shared(
            Arc::clone(socket),
            from,
            conn_id,
            &topic,
            &self.config,
        ));
        let endpoint_id = request
            .get(FIELD_CALLERID)
            .map(str::to_string)
            .unwrap_or_else(|| from.to_string());
        transport.core().set_endpoint_id(endpoint_id);
        self.connections.insert(conn_id, Arc::clone(&transport));
        publication.attach(transport as Arc<dyn Transport>);

        let reply = binding
            .publisher_header(&self.caller_id, &topic)
            .with(FIELD_LATCHING, "0")
            .with(FIELD_CONNECTION_ID, conn_id.to_string());
        log::debug!("[UDPROS] accepted {} on {} as conn {}", from, topic, conn_id);
        Ok((reply, conn_id))
    }

    /// Subscriber side of the handshake.
    fn connect_publisher(
        &self,
        topic: &str,
        peer_endpoint: &str,
        addr: SocketAddr,
    ) -> Result<Arc<UdpRosTransport>> {
        let config = &self.config;
        let local_ip = match addr {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = bind_socket(local_ip)
            .and_then(|s| s.connect(addr).map(|_| s))
            .map_err(|e| Error::connection(peer_endpoint, e))?;

        let binding = self.bindings.get_or_wildcard(topic);
        let request = binding.subscriber_header(&self.caller_id, topic);
        let datagram = DatagramHeader::new(0, Op::Handshake, 0, 0).encode(&request.encode());
        socket
            .send(&datagram)
            .map_err(|e| Error::connection(peer_endpoint, e))?;

        let deadline = Instant::now() + config.connect_timeout;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::connection(peer_endpoint, "handshake timed out"));
            }
            socket
                .set_read_timeout(Some(remaining))
                .map_err(|e| Error::connection(peer_endpoint, e))?;
            let n = match socket.recv(&mut buf) {
                Ok(n) => n,
                Err(e) if is_timeout(&e) => continue,
                Err(e) => return Err(Error::connection(peer_endpoint, e)),
            };
            let (header, payload) = match DatagramHeader::decode(&buf[..n]) {
                Ok(decoded) => decoded,
                Err(_) => continue,
            };
            match header.op {
                // A rejection carries an error header; a bare ERR is a teardown.
                Op::Handshake => {}
                Op::Err if !payload.is_empty() => {}
                op => {
                    log::trace!("[UDPROS] skipping {} while waiting for handshake", op);
                    continue;
                }
            }
            let reply = ConnectionHeader::read_from(&mut &payload[..], payload.len())
                .map_err(|e| Error::InvalidHeader(e.to_string()))??;
            check_publisher_reply(&binding, topic, &reply)?;
            let conn_id = reply
                .require(FIELD_CONNECTION_ID)?
                .parse::<u32>()
                .map_err(|_| Error::InvalidHeader("connection_id is not a u32".into()))?;

            let transport = UdpRosTransport::owned(socket, addr, conn_id, topic, config)?;
            let endpoint_id = reply
                .get(FIELD_CALLERID)
                .map(str::to_string)
                .unwrap_or_else(|| peer_endpoint.to_string());
            transport.core().set_endpoint_id(endpoint_id);
            return Ok(Arc::new(transport));
        }
    }
}

impl ProtocolHandler for UdpRosHandler {
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
                log::warn!("[UDPROS] {} -> {} failed: {}", topic, peer_endpoint, err);
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
            "[UDPROS] subscribed {} at {} (conn {})",
            topic,
            peer_endpoint,
            transport.conn_id()
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

        let bound = self.ensure_responder()?;
        let binding = match inner.bindings.get(topic) {
            Some(binding) => binding,
            None => inner.bindings.bind(topic, TopicBinding::wildcard()),
        };
        inner
            .publications
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(Publication::new(topic, binding)));
        inner.lifecycle.mark_listening()?;

        let host = inner.config.resolve_advertise_host(bound.ip());
        let descriptor = ProtocolDescriptor::new(UDPROS, host, bound.port());
        log::debug!("[UDPROS] publishing {} at {}", topic, descriptor.uri());
        Ok(descriptor)
    }

    fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.lifecycle.shutdown() {
            return;
        }
        let responder = inner.responder.lock().take();
        if let Some(mut responder) = responder {
            responder.shutdown();
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
        inner.connections.clear();

        let subscriptions = std::mem::take(&mut *inner.subscriptions.lock());
        for transport in subscriptions.iter().filter_map(Weak::upgrade) {
            transport.close();
        }
        log::debug!("[UDPROS] handler {} shut down", inner.caller_id);
    }
}

impl Drop for UdpRosHandler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for UdpRosHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpRosHandler")
            .field("caller_id", &self.inner.caller_id)
            .field("state", &self.state())
            .field("connections", &self.inner.connections.len())
            .finish()
    }
}
