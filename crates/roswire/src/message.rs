// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outgoing message contract.
//!
//! Body serialization belongs to generated message types; transports only
//! need a way to turn a message into bytes. [`RawMessage`] carries bytes
//! that were serialized elsewhere.

use crate::error::Result;

/// A message that can be written to a transport.
pub trait Message: Send + Sync {
    /// Append the serialized body to `buf`.
    ///
    /// `seq` is the per-publication sequence number; types with a header
    /// stamp it into `header.seq`, others ignore it.
    fn serialize(&self, seq: u32, buf: &mut Vec<u8>) -> Result<()>;
}

/// Pre-serialized message body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMessage(pub Vec<u8>);

impl RawMessage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for RawMessage {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Message for RawMessage {
    fn serialize(&self, _seq: u32, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.0);
        Ok(())
    }
}

impl Message for Vec<u8> {
    fn serialize(&self, _seq: u32, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self);
        Ok(())
    }
}

/// Serialize `msg` into a fresh buffer.
pub(crate) fn serialize_to_vec(msg: &dyn Message, seq: u32) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    msg.serialize(seq, &mut buf)?;
    Ok(buf)
}
