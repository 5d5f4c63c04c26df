// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPROS datagram header.
//!
//! ```text
//! +------------------+--------+------------+---------------+---------+
//! | conn id (4B LE)  | op (1B)| msg id (1B)| block (2B LE) | payload |
//! +------------------+--------+------------+---------------+---------+
//! ```
//!
//! For `DATA0` the block field carries the total block count of the
//! message; for `DATAN` it carries the block index.

use std::fmt;

use crate::error::{Error, Result};

/// Size of the datagram header.
pub const DATAGRAM_HEADER_SIZE: usize = 8;

/// Datagram operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// First block of a message
    Data0 = 0,
    /// Continuation block
    DataN = 1,
    /// Keep-alive
    Ping = 2,
    /// Connection torn down or rejected
    Err = 3,
    /// Connection header exchange
    Handshake = 4,
}

impl Op {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Op::Data0),
            1 => Some(Op::DataN),
            2 => Some(Op::Ping),
            3 => Some(Op::Err),
            4 => Some(Op::Handshake),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Data0 => "DATA0",
            Op::DataN => "DATAN",
            Op::Ping => "PING",
            Op::Err => "ERR",
            Op::Handshake => "HANDSHAKE",
        };
        f.write_str(s)
    }
}

/// Decoded datagram header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatagramHeader {
    pub conn_id: u32,
    pub op: Op,
    pub msg_id: u8,
    pub block: u16,
}

impl DatagramHeader {
    pub fn new(conn_id: u32, op: Op, msg_id: u8, block: u16) -> Self {
        Self {
            conn_id,
            op,
            msg_id,
            block,
        }
    }

    /// Header followed by `payload`.
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(DATAGRAM_HEADER_SIZE + payload.len());
        out.extend_from_slice(&self.conn_id.to_le_bytes());
        out.push(self.op as u8);
        out.push(self.msg_id);
        out.extend_from_slice(&self.block.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// Split a received datagram into header and payload.
    pub fn decode(datagram: &[u8]) -> Result<(Self, &[u8])> {
        if datagram.len() < DATAGRAM_HEADER_SIZE {
            return Err(Error::InvalidHeader(format!(
                "datagram of {} bytes is shorter than its header",
                datagram.len()
            )));
        }
        let conn_id = u32::from_le_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
        let op = Op::from_u8(datagram[4])
            .ok_or_else(|| Error::InvalidHeader(format!("unknown datagram op {}", datagram[4])))?;
        let msg_id = datagram[5];
        let block = u16::from_le_bytes([datagram[6], datagram[7]]);
        Ok((
            Self::new(conn_id, op, msg_id, block),
            &datagram[DATAGRAM_HEADER_SIZE..],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let bytes = DatagramHeader::new(0x0102_0304, Op::Data0, 7, 1).encode(b"ab");
        assert_eq!(bytes, vec![4, 3, 2, 1, 0, 7, 1, 0, b'a', b'b']);
    }

    #[test]
    fn test_decode() {
        let bytes = DatagramHeader::new(42, Op::Handshake, 0, 0).encode(b"hdr");
        let (header, payload) = DatagramHeader::decode(&bytes).unwrap();
        assert_eq!(header.conn_id, 42);
        assert_eq!(header.op, Op::Handshake);
        assert_eq!(payload, b"hdr");
    }

    #[test]
    fn test_decode_errors() {
        assert!(DatagramHeader::decode(&[0; 7]).is_err());
        assert!(DatagramHeader::decode(&[0, 0, 0, 0, 9, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_op_names() {
        assert_eq!(Op::DataN.to_string(), "DATAN");
        assert_eq!(Op::from_u8(2), Some(Op::Ping));
        assert_eq!(Op::from_u8(5), None);
    }
}
