// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Base transport variant.
//!
//! [`GenericTransport`] carries identity, statistics and close semantics but
//! no wire protocol: every I/O operation fails with
//! [`Error::NotImplemented`]. It is the placeholder used before a protocol
//! has been negotiated and the reference for what concrete transports must
//! override.

use crate::error::{Error, Result};
use crate::message::Message;

use super::{Direction, Transport, TransportCore};

/// Transport with no wire protocol.
#[derive(Debug)]
pub struct GenericTransport {
    core: TransportCore,
}

impl GenericTransport {
    /// Create an unnamed transport.
    pub fn new(direction: Direction) -> Self {
        Self {
            core: TransportCore::new(direction),
        }
    }

    /// Create a named transport.
    pub fn named(direction: Direction, name: impl Into<String>) -> Self {
        Self {
            core: TransportCore::named(direction, name),
        }
    }

    /// Wrap an existing core (e.g. one built from an injected id source).
    pub fn from_core(core: TransportCore) -> Self {
        Self { core }
    }
}

impl Transport for GenericTransport {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn send_message(&self, _msg: &dyn Message, _seq: u32) -> Result<()> {
        Err(Error::NotImplemented("send_message"))
    }

    fn write_data(&self, _data: &[u8]) -> Result<()> {
        Err(Error::NotImplemented("write_data"))
    }

    fn receive_once(&self) -> Result<Option<Vec<u8>>> {
        Err(Error::NotImplemented("receive_once"))
    }

    fn receive_loop(&self, _callback: &mut dyn FnMut(Vec<u8>)) -> Result<()> {
        Err(Error::NotImplemented("receive_loop"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::message::RawMessage;
    use crate::transport::{UNKNOWN_TRANSPORT_TYPE, UNNAMED_TRANSPORT};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_defaults_for_every_direction() {
        let mut ids = HashSet::new();
        for d in Direction::ALL {
            let t = GenericTransport::new(d);
            let core = t.core();
            assert_eq!(core.direction(), d);
            assert_eq!(core.transport_type(), UNKNOWN_TRANSPORT_TYPE);
            assert!(!core.is_done());
            assert!(!core.has_cleanup_callback());
            assert_eq!(core.endpoint_id(), "");
            assert_eq!(core.name(), UNNAMED_TRANSPORT);
            assert_eq!(core.stat_bytes(), 0);
            assert_eq!(core.stat_num_msg(), 0);
            assert!(ids.insert(core.id()), "duplicate id {}", core.id());

            let t = GenericTransport::named(d, "a name");
            assert_eq!(t.direction(), d);
            assert_eq!(t.core().name(), "a name");
            assert!(ids.insert(t.id()));
        }
    }

    #[test]
    fn test_close_without_callback() {
        let t = GenericTransport::new(Direction::Inbound);
        t.close();
        assert!(t.is_done());
    }

    #[test]
    fn test_close_twice_fires_callback_once() {
        let t = GenericTransport::new(Direction::Inbound);
        let fired = Arc::new(AtomicUsize::new(0));
        let closed_id = Arc::new(Mutex::new(None));

        let (counter, slot) = (fired.clone(), closed_id.clone());
        t.core().set_cleanup_callback(move |core| {
            counter.fetch_add(1, Ordering::SeqCst);
            *slot.lock() = Some(core.id());
        });
        assert!(t.core().has_cleanup_callback());

        t.close();
        t.close();
        assert!(t.is_done());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(*closed_id.lock(), Some(t.id()));
    }

    #[test]
    fn test_replaced_callback_only_latest_fires() {
        let t = GenericTransport::new(Direction::Outbound);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let c1 = first.clone();
        t.core().set_cleanup_callback(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = second.clone();
        t.core().set_cleanup_callback(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        t.close();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_io_operations_are_abstract() {
        let t = GenericTransport::new(Direction::Outbound);
        let msg = RawMessage::from("msg");
        assert_eq!(
            t.send_message(&msg, 1).unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
        assert_eq!(
            t.write_data(b"data").unwrap_err().kind(),
            ErrorKind::NotImplemented
        );

        let t = GenericTransport::new(Direction::Inbound);
        assert_eq!(
            t.receive_once().unwrap_err().kind(),
            ErrorKind::NotImplemented
        );
        let mut delivered = 0;
        let err = t.receive_loop(&mut |_| delivered += 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
        assert_eq!(delivered, 0);
        // Abstract failures are programming errors and do not close the transport.
        assert!(!t.is_done());
    }
}
