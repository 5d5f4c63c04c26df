// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCPROS: topic transport over TCP streams.
//!
//! # Connection Setup
//!
//! ```text
//!   subscriber                              publisher
//!       |  connect (connect_timeout)            |
//!       |-------------------------------------->|
//!       |  header: callerid topic md5sum type   |
//!       |-------------------------------------->|  validate against binding
//!       |  header: callerid md5sum type         |
//!       |       message_definition latching     |
//!       |<--------------------------------------|  (or error=...)
//!       |  [len LE][body] [len LE][body] ...    |
//!       |<--------------------------------------|
//! ```
//!
//! # Modules
//!
//! - `codec` - Length-prefix framing
//! - `handler` - [`TcpRosHandler`]
//! - `listener` - mio accept loop
//! - `transport` - [`TcpRosTransport`]

pub mod codec;
pub mod handler;
mod listener;
pub mod transport;

pub use codec::{FrameCodec, FRAME_HEADER_SIZE};
pub use handler::TcpRosHandler;
pub use transport::TcpRosTransport;
