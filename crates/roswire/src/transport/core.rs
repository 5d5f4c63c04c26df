// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identity, statistics and close state shared by every transport.
//!
//! # Thread Safety
//!
//! - `done` and both counters are atomics: the I/O thread updates them while
//!   diagnostics read them from anywhere.
//! - `endpoint_id` is an `ArcSwap`: written once during connection setup,
//!   read lock-free afterwards.
//! - The cleanup callback sits behind a mutex and is *taken* on the close
//!   transition, so it can never run twice.
//!
//! The transport id counter is the only process-wide mutable state in the
//! crate. It is reached through [`next_transport_id`]; tests that need
//! deterministic ids pass their own [`IdSource`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::Direction;

/// `transport_type` of a transport that did not set one.
pub const UNKNOWN_TRANSPORT_TYPE: &str = "UNKNOWN";

/// `name` of a transport created without one.
pub const UNNAMED_TRANSPORT: &str = "unnamed";

/// Callback fired once when a transport closes, given the closed core.
pub type CleanupCallback = Box<dyn FnOnce(&TransportCore) + Send>;

// ============================================================================
// Id allocation
// ============================================================================

/// Source of transport ids.
pub trait IdSource: Send + Sync {
    /// Return an id never returned before by this source.
    fn next_id(&self) -> u64;
}

/// Monotonic id counter starting at 1.
#[derive(Debug)]
pub struct IdCounter {
    next: AtomicU64,
}

impl IdCounter {
    /// Create a counter whose first id is 1.
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Create a counter whose first id is `first`.
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for IdCounter {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

static GLOBAL_TRANSPORT_IDS: IdCounter = IdCounter::new();

/// Allocate the next process-wide transport id.
pub fn next_transport_id() -> u64 {
    GLOBAL_TRANSPORT_IDS.next_id()
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics row of a live or dead transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportStats {
    /// Transport id
    pub id: u64,
    /// Bytes moved so far
    pub bytes: u64,
    /// Messages moved so far
    pub num_msg: u64,
    /// Whether the transport is still open
    pub connected: bool,
}

// ============================================================================
// Transport core
// ============================================================================

/// Identity, statistics and close state of one transport.
pub struct TransportCore {
    id: u64,
    direction: Direction,
    transport_type: String,
    name: String,
    endpoint_id: ArcSwap<String>,
    done: AtomicBool,
    stat_bytes: AtomicU64,
    stat_num_msg: AtomicU64,
    cleanup_cb: Mutex<Option<CleanupCallback>>,
}

impl TransportCore {
    /// Create an unnamed core with a process-wide unique id.
    pub fn new(direction: Direction) -> Self {
        Self::build(next_transport_id(), direction, UNNAMED_TRANSPORT)
    }

    /// Create a named core with a process-wide unique id.
    pub fn named(direction: Direction, name: impl Into<String>) -> Self {
        Self::build(next_transport_id(), direction, name)
    }

    /// Create a core drawing its id from `ids`.
    pub fn with_id_source(
        ids: &dyn IdSource,
        direction: Direction,
        name: Option<&str>,
    ) -> Self {
        Self::build(ids.next_id(), direction, name.unwrap_or(UNNAMED_TRANSPORT))
    }

    fn build(id: u64, direction: Direction, name: impl Into<String>) -> Self {
        Self {
            id,
            direction,
            transport_type: UNKNOWN_TRANSPORT_TYPE.to_string(),
            name: name.into(),
            endpoint_id: ArcSwap::from_pointee(String::new()),
            done: AtomicBool::new(false),
            stat_bytes: AtomicU64::new(0),
            stat_num_msg: AtomicU64::new(0),
            cleanup_cb: Mutex::new(None),
        }
    }

    /// Builder: tag the concrete wire protocol.
    pub fn with_transport_type(mut self, transport_type: impl Into<String>) -> Self {
        self.transport_type = transport_type.into();
        self
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Concrete protocol tag.
    pub fn transport_type(&self) -> &str {
        &self.transport_type
    }

    /// Human label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote peer identifier (empty until known).
    pub fn endpoint_id(&self) -> String {
        self.endpoint_id.load().as_ref().clone()
    }

    /// Whether `close()` has run.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Bytes moved so far.
    pub fn stat_bytes(&self) -> u64 {
        self.stat_bytes.load(Ordering::Relaxed)
    }

    /// Messages moved so far.
    pub fn stat_num_msg(&self) -> u64 {
        self.stat_num_msg.load(Ordering::Relaxed)
    }

    /// Whether a cleanup callback is installed (and has not fired yet).
    pub fn has_cleanup_callback(&self) -> bool {
        self.cleanup_cb.lock().is_some()
    }

    /// Statistics row for diagnostics.
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            id: self.id,
            bytes: self.stat_bytes(),
            num_msg: self.stat_num_msg(),
            connected: !self.is_done(),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Record the remote peer identifier.
    pub fn set_endpoint_id(&self, endpoint_id: impl Into<String>) {
        self.endpoint_id.store(Arc::new(endpoint_id.into()));
    }

    /// Add to the byte counter.
    pub fn add_bytes(&self, bytes: u64) {
        self.stat_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Add to the message counter.
    pub fn add_messages(&self, count: u64) {
        self.stat_num_msg.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one message of `bytes` bytes.
    pub fn record_message(&self, bytes: usize) {
        self.add_bytes(bytes as u64);
        self.add_messages(1);
    }

    /// Install (or replace) the cleanup callback.
    ///
    /// The callback receives this core, already marked done, in place of
    /// the owning transport. [`DeadTransport::from_core`] turns it into a
    /// snapshot.
    ///
    /// [`DeadTransport::from_core`]: super::DeadTransport::from_core
    pub fn set_cleanup_callback<F>(&self, cb: F)
    where
        F: FnOnce(&TransportCore) + Send + 'static,
    {
        *self.cleanup_cb.lock() = Some(Box::new(cb));
    }

    /// Mark the transport done and fire the cleanup callback.
    ///
    /// Returns `true` for the call that performed the transition; later
    /// calls are no-ops returning `false`.
    pub fn close(&self) -> bool {
        if self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // Taken out of the lock so the callback may inspect this core.
        let cb = self.cleanup_cb.lock().take();
        if let Some(cb) = cb {
            cb(self);
        }
        log::trace!("[transport] closed {} #{}", self.name, self.id);
        true
    }
}

impl fmt::Debug for TransportCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportCore")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("transport_type", &self.transport_type)
            .field("name", &self.name)
            .field("endpoint_id", &self.endpoint_id())
            .field("done", &self.is_done())
            .field("stat_bytes", &self.stat_bytes())
            .field("stat_num_msg", &self.stat_num_msg())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_injected_id_source_is_deterministic() {
        let ids = IdCounter::starting_at(100);
        let a = TransportCore::with_id_source(&ids, Direction::Inbound, None);
        let b = TransportCore::with_id_source(&ids, Direction::Outbound, Some("b"));
        assert_eq!(a.id(), 100);
        assert_eq!(b.id(), 101);
        assert_eq!(a.name(), UNNAMED_TRANSPORT);
        assert_eq!(b.name(), "b");
    }

    #[test]
    fn test_global_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..200).map(|_| next_transport_id()).collect::<Vec<_>>()))
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_concurrent_close_fires_callback_once() {
        let core = Arc::new(TransportCore::new(Direction::Inbound));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        core.set_cleanup_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let core = core.clone();
                thread::spawn(move || core.close())
            })
            .collect();
        let transitions = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|performed| *performed)
            .count();

        assert_eq!(transitions, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(core.is_done());
    }

    #[test]
    fn test_callback_sees_closed_core() {
        let core = TransportCore::named(Direction::Outbound, "pub");
        core.set_endpoint_id("/listener");
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        core.set_cleanup_callback(move |c| {
            *slot.lock() = Some((c.id(), c.is_done(), c.endpoint_id()));
        });
        core.close();

        let (id, done, endpoint) = seen.lock().clone().unwrap();
        assert_eq!(id, core.id());
        assert!(done);
        assert_eq!(endpoint, "/listener");
        assert!(!core.has_cleanup_callback());
    }

    #[test]
    fn test_stats_row() {
        let core = TransportCore::new(Direction::Inbound);
        core.record_message(10);
        core.record_message(22);
        let stats = core.stats();
        assert_eq!(stats.bytes, 32);
        assert_eq!(stats.num_msg, 2);
        assert!(stats.connected);
        core.close();
        assert!(!core.stats().connected);
    }
}
