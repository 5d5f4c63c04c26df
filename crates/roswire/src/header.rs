// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection header codec.
//!
//! Both peers exchange a connection header before any message flows. The
//! header names the topic and carries the message contract (type and
//! checksum) so each side can reject an incompatible peer.
//!
//! # Wire Format
//!
//! ```text
//! +-----------------+-----------------+------------------+-----+
//! | Total len (4 LE)| Field len (4 LE)| "key=value" UTF-8| ... |
//! +-----------------+-----------------+------------------+-----+
//! ```
//!
//! The total length covers every field (length prefixes included) but not
//! itself.
//!
//! # Example
//!
//! ```
//! use roswire::header::ConnectionHeader;
//!
//! let mut header = ConnectionHeader::new();
//! header.insert("topic", "/chatter");
//! header.insert("type", "std_msgs/String");
//!
//! let bytes = header.encode();
//! let decoded = ConnectionHeader::decode(&bytes[4..]).unwrap();
//! assert_eq!(decoded.get("topic"), Some("/chatter"));
//! ```

use std::fmt;
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Size of every length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Topic name (absolute).
pub const FIELD_TOPIC: &str = "topic";
/// Message type (`package/Short`, or `*`).
pub const FIELD_TYPE: &str = "type";
/// Message checksum (hex md5, or `*`).
pub const FIELD_MD5SUM: &str = "md5sum";
/// Sending node name.
pub const FIELD_CALLERID: &str = "callerid";
/// Full message definition text.
pub const FIELD_MESSAGE_DEFINITION: &str = "message_definition";
/// Rejection reason; present only in error replies.
pub const FIELD_ERROR: &str = "error";
/// Subscriber's TCP_NODELAY request (`0`/`1`).
pub const FIELD_TCP_NODELAY: &str = "tcp_nodelay";
/// Whether the publisher latches its last message (`0`/`1`).
pub const FIELD_LATCHING: &str = "latching";
/// Datagram connection id assigned by a UDPROS publisher.
pub const FIELD_CONNECTION_ID: &str = "connection_id";

/// Value accepted in place of a type or checksum.
pub const WILDCARD: &str = "*";

/// Ordered `key=value` connection header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionHeader {
    fields: Vec<(String, String)>,
}

impl ConnectionHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header carrying only an `error` field.
    pub fn error(reason: impl Into<String>) -> Self {
        let mut header = Self::new();
        header.insert(FIELD_ERROR, reason);
        header
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key`, or an [`Error::InvalidHeader`] naming the missing field.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::InvalidHeader(format!("missing field '{}'", key)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode with the leading total-length prefix.
    pub fn encode(&self) -> Vec<u8> {
        let body_len: usize = self
            .fields
            .iter()
            .map(|(k, v)| LENGTH_PREFIX_SIZE + k.len() + 1 + v.len())
            .sum();
        let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + body_len);
        out.extend_from_slice(&(body_len as u32).to_le_bytes());
        for (k, v) in &self.fields {
            let field_len = (k.len() + 1 + v.len()) as u32;
            out.extend_from_slice(&field_len.to_le_bytes());
            out.extend_from_slice(k.as_bytes());
            out.push(b'=');
            out.extend_from_slice(v.as_bytes());
        }
        out
    }

    /// Decode a header body (everything after the total-length prefix).
    pub fn decode(mut body: &[u8]) -> Result<Self> {
        let mut header = Self::new();
        while !body.is_empty() {
            if body.len() < LENGTH_PREFIX_SIZE {
                return Err(Error::InvalidHeader("truncated field length".into()));
            }
            let field_len = u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
            body = &body[LENGTH_PREFIX_SIZE..];
            if field_len > body.len() {
                return Err(Error::InvalidHeader(format!(
                    "field length {} exceeds remaining {} bytes",
                    field_len,
                    body.len()
                )));
            }
            let (field, rest) = body.split_at(field_len);
            body = rest;

            let field = std::str::from_utf8(field)
                .map_err(|_| Error::InvalidHeader("field is not UTF-8".into()))?;
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| Error::InvalidHeader(format!("field '{}' has no '='", field)))?;
            header.insert(key, value);
        }
        Ok(header)
    }

    /// Write the encoded header.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.encode())?;
        writer.flush()
    }

    /// Read one header, rejecting bodies larger than `max_size`.
    ///
    /// I/O failures are reported as `std::io::Error` so the caller can map
    /// them to the right error class (handshake vs. established transport).
    pub fn read_from<R: Read>(reader: &mut R, max_size: usize) -> std::io::Result<Result<Self>> {
        let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > max_size {
            return Ok(Err(Error::InvalidHeader(format!(
                "header of {} bytes exceeds limit {}",
                len, max_size
            ))));
        }
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body)?;
        Ok(Self::decode(&body))
    }
}

impl fmt::Display for ConnectionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.fields {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            // Definitions are long and multi-line; keep log lines short.
            if k == FIELD_MESSAGE_DEFINITION {
                write!(f, "{}=<{} bytes>", k, v.len())?;
            } else {
                write!(f, "{}={}", k, v)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> ConnectionHeader {
        ConnectionHeader::new()
            .with(FIELD_CALLERID, "/listener")
            .with(FIELD_TOPIC, "/chatter")
            .with(FIELD_TYPE, "std_msgs/String")
            .with(FIELD_MD5SUM, "992ce8a1687cec8c8bd883ec73ca41d1")
    }

    #[test]
    fn test_encode_layout() {
        let header = ConnectionHeader::new().with("a", "b");
        let bytes = header.encode();
        assert_eq!(bytes, vec![7, 0, 0, 0, 3, 0, 0, 0, b'a', b'=', b'b']);
    }

    #[test]
    fn test_values_may_contain_equals() {
        let header = ConnectionHeader::new().with("message_definition", "int32 X=1");
        let decoded = ConnectionHeader::decode(&header.encode()[4..]).unwrap();
        assert_eq!(decoded.get("message_definition"), Some("int32 X=1"));
    }

    #[test]
    fn test_read_from_stream() {
        let header = sample();
        let mut cursor = Cursor::new(header.encode());
        let decoded = ConnectionHeader::read_from(&mut cursor, 1024).unwrap().unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_read_rejects_oversized() {
        let mut cursor = Cursor::new(sample().encode());
        let result = ConnectionHeader::read_from(&mut cursor, 8).unwrap();
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_decode_errors() {
        // Truncated length prefix
        assert!(ConnectionHeader::decode(&[1, 0]).is_err());
        // Field longer than body
        assert!(ConnectionHeader::decode(&[9, 0, 0, 0, b'a']).is_err());
        // Missing '='
        assert!(ConnectionHeader::decode(&[2, 0, 0, 0, b'a', b'b']).is_err());
    }

    #[test]
    fn test_insert_replaces() {
        let mut header = sample();
        header.insert(FIELD_TOPIC, "/other");
        assert_eq!(header.get(FIELD_TOPIC), Some("/other"));
        assert_eq!(header.len(), 4);
        assert!(header.require("missing").is_err());
    }

    #[test]
    fn test_display_elides_definition() {
        let header = ConnectionHeader::new()
            .with(FIELD_TOPIC, "/t")
            .with(FIELD_MESSAGE_DEFINITION, "string data\n");
        assert_eq!(header.to_string(), "topic=/t, message_definition=<12 bytes>");
    }
}
