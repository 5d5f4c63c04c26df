// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPROS datagram transport.
//!
//! A subscriber transport owns a socket connected to the publisher and only
//! reads. A publisher transport shares the handler's socket and only
//! writes; the handler's receive thread handles whatever the subscriber
//! sends back (`ERR` teardown), so the operation a side does not carry
//! fails with [`Error::NotImplemented`].
//!
//! Closing either side sends an `ERR` datagram so the peer drops the
//! connection too.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::datagram::{DatagramHeader, Op, DATAGRAM_HEADER_SIZE};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::handler::UDPROS;
use crate::message::{serialize_to_vec, Message};
use crate::tcpros::codec::is_timeout;
use crate::transport::{Direction, Transport, TransportCore};

enum Link {
    /// Socket connected to the peer, read directly.
    Owned(UdpSocket),
    /// Handler socket, written with `send_to`.
    Shared(Arc<UdpSocket>),
}

/// Transport over one UDPROS connection.
pub struct UdpRosTransport {
    core: TransportCore,
    conn_id: u32,
    peer: SocketAddr,
    link: Link,
    max_payload: usize,
    msg_id: AtomicU8,
}

impl UdpRosTransport {
    /// Subscriber side: `socket` is connected to `peer` and the handshake is done.
    pub(crate) fn owned(
        socket: UdpSocket,
        peer: SocketAddr,
        conn_id: u32,
        topic: &str,
        config: &TransportConfig,
    ) -> Result<Self> {
        socket
            .set_read_timeout(Some(config.read_poll_interval))
            .map_err(|e| Error::Resource(format!("configure UDPROS socket: {}", e)))?;
        Ok(Self::build(
            Direction::Inbound,
            Link::Owned(socket),
            peer,
            conn_id,
            topic,
            config,
        ))
    }

    /// Publisher side: writes go through the shared handler socket.
    pub(crate) fn shared(
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
        conn_id: u32,
        topic: &str,
        config: &TransportConfig,
    ) -> Self {
        Self::build(
            Direction::Outbound,
            Link::Shared(socket),
            peer,
            conn_id,
            topic,
            config,
        )
    }

    fn build(
        direction: Direction,
        link: Link,
        peer: SocketAddr,
        conn_id: u32,
        topic: &str,
        config: &TransportConfig,
    ) -> Self {
        Self {
            core: TransportCore::named(direction, topic).with_transport_type(UDPROS),
            conn_id,
            peer,
            link,
            max_payload: config.max_datagram_size.saturating_sub(DATAGRAM_HEADER_SIZE),
            msg_id: AtomicU8::new(0),
        }
    }

    /// Connection id assigned by the publisher.
    pub fn conn_id(&self) -> u32 {
        self.conn_id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Largest payload a single datagram carries.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn send_datagram(&self, datagram: &[u8]) -> std::io::Result<usize> {
        match &self.link {
            Link::Owned(socket) => socket.send(datagram),
            Link::Shared(socket) => socket.send_to(datagram, self.peer),
        }
    }

    fn fail(&self, context: &str, err: &std::io::Error) -> Error {
        let err = Error::terminal(context, err);
        log::debug!(
            "[UDPROS] {} #{} (conn {}) failed: {}",
            self.core.name(),
            self.core.id(),
            self.conn_id,
            err
        );
        self.close();
        err
    }

    fn receive_owned(&self, socket: &UdpSocket) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; DATAGRAM_HEADER_SIZE + self.max_payload];
        loop {
            if self.core.is_done() {
                return Ok(None);
            }
            let n = match socket.recv(&mut buf) {
                Ok(n) => n,
                Err(e) if is_timeout(&e) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) if self.core.is_done() => return Ok(None),
                Err(e) => return Err(self.fail("recv", &e)),
            };
            let (header, payload) = match DatagramHeader::decode(&buf[..n]) {
                Ok(decoded) => decoded,
                Err(err) => {
                    log::trace!("[UDPROS] dropping datagram: {}", err);
                    continue;
                }
            };
            if header.conn_id != self.conn_id {
                continue;
            }
            match header.op {
                Op::Data0 if header.block <= 1 => {
                    self.core.record_message(n);
                    return Ok(Some(payload.to_vec()));
                }
                Op::Err => {
                    let err = Error::IoTerminal(format!(
                        "publisher closed connection {}",
                        self.conn_id
                    ));
                    // Already torn down remotely; no ERR reply.
                    self.core.close();
                    return Err(err);
                }
                op => log::trace!("[UDPROS] ignoring {} on conn {}", op, self.conn_id),
            }
        }
    }
}

impl Transport for UdpRosTransport {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn send_message(&self, msg: &dyn Message, seq: u32) -> Result<()> {
        let data = serialize_to_vec(msg, seq)?;
        self.write_data(&data)
    }

    fn write_data(&self, data: &[u8]) -> Result<()> {
        if matches!(self.link, Link::Owned(_)) {
            return Err(Error::NotImplemented("write_data on a UDPROS subscriber link"));
        }
        if self.core.is_done() {
            return Err(Error::IoTerminal(format!(
                "write on closed transport #{}",
                self.core.id()
            )));
        }
        if data.len() > self.max_payload {
            return Err(Error::PayloadTooLarge {
                size: data.len(),
                max: self.max_payload,
            });
        }

        let msg_id = self.msg_id.fetch_add(1, Ordering::Relaxed);
        let datagram = DatagramHeader::new(self.conn_id, Op::Data0, msg_id, 1).encode(data);
        self.send_datagram(&datagram)
            .map_err(|e| self.fail("send", &e))?;
        self.core.record_message(datagram.len());
        Ok(())
    }

    fn receive_once(&self) -> Result<Option<Vec<u8>>> {
        match &self.link {
            Link::Owned(socket) => self.receive_owned(socket),
            Link::Shared(_) => Err(Error::NotImplemented(
                "receive_once on a UDPROS publisher link",
            )),
        }
    }

    fn close(&self) {
        if self.core.close() {
            let bye = DatagramHeader::new(self.conn_id, Op::Err, 0, 0).encode(&[]);
            if let Err(e) = self.send_datagram(&bye) {
                log::trace!("[UDPROS] ERR to {} not sent: {}", self.peer, e);
            }
            log::debug!(
                "[UDPROS] closed {} #{} (conn {}, {})",
                self.core.name(),
                self.core.id(),
                self.conn_id,
                self.core.endpoint_id()
            );
        }
    }
}

impl std::fmt::Debug for UdpRosTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpRosTransport")
            .field("core", &self.core)
            .field("conn_id", &self.conn_id)
            .field("peer", &self.peer)
            .finish()
    }
}
