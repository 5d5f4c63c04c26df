// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction and lifecycle.
//!
//! A transport is one directional (or bidirectional) channel carrying one
//! topic connection over one concrete wire protocol. Every transport owns a
//! [`TransportCore`] holding its identity, statistics and close state; the
//! [`Transport`] trait exposes that core and adds the protocol-specific I/O.
//!
//! # Lifecycle
//!
//! ```text
//!   new(direction) ---> open ---(close() / terminal I/O error)---> done
//!                        |                                          |
//!                        | stats, endpoint_id mutate               | cleanup callback
//!                        v                                          v  fires once
//!                   DeadTransport::from_transport()  <--------------+
//! ```
//!
//! # Modules
//!
//! - `core` - Identity, statistics, close state and the id counter
//! - `generic` - Base variant whose I/O operations are not implemented
//! - `dead` - Inert post-closure snapshot for diagnostics

pub mod core;
pub mod dead;
pub mod generic;

pub use self::core::{
    next_transport_id, CleanupCallback, IdCounter, IdSource, TransportCore, TransportStats,
    UNKNOWN_TRANSPORT_TYPE, UNNAMED_TRANSPORT,
};
pub use dead::DeadTransport;
pub use generic::GenericTransport;

use std::fmt;

use crate::error::{ErrorKind, Result};
use crate::message::Message;

/// Direction of a transport relative to this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Receives messages (subscriber side)
    Inbound,
    /// Sends messages (publisher side)
    Outbound,
    /// Sends and receives (service connections)
    Bidirectional,
}

impl Direction {
    /// All directions, in declaration order.
    pub const ALL: [Direction; 3] = [
        Direction::Inbound,
        Direction::Outbound,
        Direction::Bidirectional,
    ];

    /// Single-letter code used in connection statistics.
    pub fn code(&self) -> &'static str {
        match self {
            Direction::Inbound => "i",
            Direction::Outbound => "o",
            Direction::Bidirectional => "b",
        }
    }

    /// Whether messages flow into this process.
    pub fn is_inbound(&self) -> bool {
        matches!(self, Direction::Inbound | Direction::Bidirectional)
    }

    /// Whether messages flow out of this process.
    pub fn is_outbound(&self) -> bool {
        matches!(self, Direction::Outbound | Direction::Bidirectional)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A live communication channel for one topic connection.
///
/// Implementations must be shareable across threads: the receive loop runs
/// on its own thread while another thread may call [`Transport::close`].
/// Closing must make a blocked [`Transport::receive_once`] return promptly.
pub trait Transport: Send + Sync {
    /// Shared identity, statistics and close state.
    fn core(&self) -> &TransportCore;

    /// Serialize `msg` with sequence number `seq` and write it.
    ///
    /// Increments `stat_bytes` and `stat_num_msg` on success.
    fn send_message(&self, msg: &dyn Message, seq: u32) -> Result<()>;

    /// Write one already-serialized message.
    fn write_data(&self, data: &[u8]) -> Result<()>;

    /// Block until one message arrives and return it.
    ///
    /// Returns `Ok(None)` once the transport is closed.
    fn receive_once(&self) -> Result<Option<Vec<u8>>>;

    /// Deliver messages to `callback` in arrival order until closed.
    ///
    /// Returns `Ok(())` when the transport was closed, or the error that
    /// terminated the loop. Terminal I/O errors close the transport before
    /// they are returned.
    fn receive_loop(&self, callback: &mut dyn FnMut(Vec<u8>)) -> Result<()> {
        loop {
            match self.receive_once() {
                Ok(Some(msg)) => callback(msg),
                Ok(None) => return Ok(()),
                Err(err) => {
                    if err.kind() == ErrorKind::IoTerminal {
                        log::debug!(
                            "[transport] {} #{} receive loop terminated: {}",
                            self.core().name(),
                            self.core().id(),
                            err
                        );
                        self.close();
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Close the transport. Idempotent; the cleanup callback fires at most once.
    fn close(&self) {
        self.core().close();
    }

    /// Unique id of this transport.
    fn id(&self) -> u64 {
        self.core().id()
    }

    /// Direction of this transport.
    fn direction(&self) -> Direction {
        self.core().direction()
    }

    /// Whether the transport has been closed.
    fn is_done(&self) -> bool {
        self.core().is_done()
    }
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.core(), f)
    }
}
