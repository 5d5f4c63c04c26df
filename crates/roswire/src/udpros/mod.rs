// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPROS: topic transport over UDP datagrams.
//!
//! # Connection Setup
//!
//! ```text
//!   subscriber                                  publisher
//!       |  HANDSHAKE conn=0 [connection header]     |
//!       |------------------------------------------>|  validate against binding
//!       |  HANDSHAKE conn=N [header + connection_id]|
//!       |<------------------------------------------|  (or ERR [error=...])
//!       |  DATA0 conn=N msg=k block=1 [body]        |
//!       |<------------------------------------------|
//!       |  ERR conn=N                               |
//!       |<----------------------------------------->|  either side closes
//! ```
//!
//! Every message travels in a single datagram: bodies larger than
//! `max_datagram_size - DATAGRAM_HEADER_SIZE` are rejected.

pub mod datagram;
pub mod handler;
pub mod transport;

pub use datagram::{DatagramHeader, Op, DATAGRAM_HEADER_SIZE};
pub use handler::UdpRosHandler;
pub use transport::UdpRosTransport;
