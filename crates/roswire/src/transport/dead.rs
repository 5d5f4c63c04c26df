// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inert snapshot of a transport, kept for diagnostics after the live
//! connection is gone.

use super::{Direction, Transport, TransportCore, TransportStats};

/// Frozen copy of a transport's identity and statistics.
///
/// Holds no socket and no callback. `done` is always true, whether or not
/// the source transport had been closed when the snapshot was taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadTransport {
    id: u64,
    direction: Direction,
    transport_type: String,
    name: String,
    endpoint_id: String,
    stat_bytes: u64,
    stat_num_msg: u64,
}

impl DeadTransport {
    /// Snapshot `transport` as it is now.
    pub fn from_transport(transport: &dyn Transport) -> Self {
        Self::from_core(transport.core())
    }

    /// Snapshot a transport core as it is now.
    pub fn from_core(core: &TransportCore) -> Self {
        Self {
            id: core.id(),
            direction: core.direction(),
            transport_type: core.transport_type().to_string(),
            name: core.name().to_string(),
            endpoint_id: core.endpoint_id(),
            stat_bytes: core.stat_bytes(),
            stat_num_msg: core.stat_num_msg(),
        }
    }

    /// Id of the source transport.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Direction of the source transport.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Protocol tag of the source transport.
    pub fn transport_type(&self) -> &str {
        &self.transport_type
    }

    /// Human label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote peer identifier at snapshot time.
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    /// Bytes moved before the snapshot.
    pub fn stat_bytes(&self) -> u64 {
        self.stat_bytes
    }

    /// Messages moved before the snapshot.
    pub fn stat_num_msg(&self) -> u64 {
        self.stat_num_msg
    }

    /// Always true.
    pub fn is_done(&self) -> bool {
        true
    }

    /// Statistics row, reported as disconnected.
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            id: self.id,
            bytes: self.stat_bytes,
            num_msg: self.stat_num_msg,
            connected: false,
        }
    }
}

impl From<&TransportCore> for DeadTransport {
    fn from(core: &TransportCore) -> Self {
        Self::from_core(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::GenericTransport;

    #[test]
    fn test_snapshot_of_open_transport() {
        let t = GenericTransport::named(Direction::Inbound, "foo");
        t.core().add_bytes(1234);
        t.core().add_messages(5678);

        let dead = DeadTransport::from_transport(&t);
        assert_eq!(dead.direction(), Direction::Inbound);
        assert_eq!(dead.name(), "foo");
        assert_eq!(dead.stat_bytes(), 1234);
        assert_eq!(dead.stat_num_msg(), 5678);
        assert!(dead.is_done());
        assert_eq!(dead.endpoint_id(), "");
        assert_eq!(dead.id(), t.id());
        // The source is untouched.
        assert!(!t.is_done());
    }

    #[test]
    fn test_snapshot_of_closed_transport() {
        let t = GenericTransport::named(Direction::Outbound, "bar");
        t.core().set_endpoint_id("blah blah");
        t.close();

        let dead = DeadTransport::from_transport(&t);
        assert_eq!(dead.direction(), Direction::Outbound);
        assert_eq!(dead.name(), "bar");
        assert!(dead.is_done());
        assert_eq!(dead.endpoint_id(), t.core().endpoint_id());
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let t = GenericTransport::new(Direction::Bidirectional);
        t.core().record_message(10);
        let dead = DeadTransport::from(t.core());
        t.core().record_message(10);
        t.core().set_endpoint_id("later");

        assert_eq!(dead.stat_bytes(), 10);
        assert_eq!(dead.stat_num_msg(), 1);
        assert_eq!(dead.endpoint_id(), "");
        assert!(!dead.stats().connected);
    }
}
