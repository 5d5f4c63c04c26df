// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCPROS stream transport.
//!
//! One [`TcpRosTransport`] wraps one connected socket after the connection
//! header exchange. Reads block with a short timeout (the configured
//! `read_poll_interval`) so a concurrent [`Transport::close`] is noticed
//! promptly; `close` also shuts the socket down to wake the reader.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};

use parking_lot::Mutex;

use super::codec::{FrameCodec, FRAME_HEADER_SIZE};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::handler::TCPROS;
use crate::message::{serialize_to_vec, Message};
use crate::transport::{Direction, Transport, TransportCore};

/// Transport over one TCPROS connection.
pub struct TcpRosTransport {
    core: TransportCore,
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    max_message_size: usize,
    reader: Mutex<FrameCodec>,
    writer: Mutex<()>,
}

impl TcpRosTransport {
    /// Wrap a connected stream whose header exchange has completed.
    pub fn new(
        stream: TcpStream,
        direction: Direction,
        topic: &str,
        config: &TransportConfig,
    ) -> Result<Self> {
        let core = TransportCore::named(direction, topic).with_transport_type(TCPROS);
        Self::with_core(stream, core, config)
    }

    /// Wrap a connected stream with a prepared core.
    pub fn with_core(
        stream: TcpStream,
        core: TransportCore,
        config: &TransportConfig,
    ) -> Result<Self> {
        stream
            .set_read_timeout(Some(config.read_poll_interval))
            .and_then(|_| stream.set_write_timeout(Some(config.write_timeout)))
            .map_err(|e| Error::Resource(format!("configure TCPROS socket: {}", e)))?;
        let peer_addr = stream.peer_addr().ok();

        Ok(Self {
            core,
            stream,
            peer_addr,
            max_message_size: config.max_message_size,
            reader: Mutex::new(FrameCodec::new(config.max_message_size)),
            writer: Mutex::new(()),
        })
    }

    /// Remote socket address, if it was known at construction.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.local_addr().ok()
    }

    /// Close after an I/O failure and report it as terminal.
    fn fail(&self, context: &str, err: &std::io::Error) -> Error {
        let err = Error::terminal(context, err);
        if !self.core.is_done() {
            log::debug!(
                "[TCPROS] {} #{} ({}) failed: {}",
                self.core.name(),
                self.core.id(),
                self.core.endpoint_id(),
                err
            );
        }
        self.close();
        err
    }
}

impl Transport for TcpRosTransport {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn send_message(&self, msg: &dyn Message, seq: u32) -> Result<()> {
        let data = serialize_to_vec(msg, seq)?;
        self.write_data(&data)
    }

    fn write_data(&self, data: &[u8]) -> Result<()> {
        if self.core.is_done() {
            return Err(Error::IoTerminal(format!(
                "write on closed transport #{}",
                self.core.id()
            )));
        }
        if data.len() > self.max_message_size {
            return Err(Error::PayloadTooLarge {
                size: data.len(),
                max: self.max_message_size,
            });
        }

        let frame = FrameCodec::encode(data);
        {
            let _guard = self.writer.lock();
            (&self.stream)
                .write_all(&frame)
                .map_err(|e| self.fail("write", &e))?;
        }
        self.core.record_message(frame.len());
        log::trace!(
            "[TCPROS] {} #{} wrote {} bytes",
            self.core.name(),
            self.core.id(),
            frame.len()
        );
        Ok(())
    }

    fn receive_once(&self) -> Result<Option<Vec<u8>>> {
        let mut codec = self.reader.lock();
        loop {
            if self.core.is_done() {
                return Ok(None);
            }
            match codec.decode(&mut &self.stream) {
                Ok(Some(body)) => {
                    self.core.record_message(FRAME_HEADER_SIZE + body.len());
                    return Ok(Some(body));
                }
                Ok(None) => continue,
                // A reader woken by close() sees EOF or a reset.
                Err(_) if self.core.is_done() => return Ok(None),
                Err(e) => return Err(self.fail("read", &e)),
            }
        }
    }

    fn close(&self) {
        if self.core.close() {
            let _ = self.stream.shutdown(Shutdown::Both);
            log::debug!(
                "[TCPROS] closed {} #{} ({})",
                self.core.name(),
                self.core.id(),
                self.core.endpoint_id()
            );
        }
    }
}

impl std::fmt::Debug for TcpRosTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpRosTransport")
            .field("core", &self.core)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
