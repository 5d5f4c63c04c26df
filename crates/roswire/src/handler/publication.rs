// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher-side fan-out for one topic.
//!
//! A [`Publication`] owns the outbound transports of every subscriber
//! connected to a topic. Each transport removes itself through its cleanup
//! callback, so a dropped subscriber disappears from the fan-out list as
//! soon as its transport closes. A [`DeadTransport`] snapshot of it stays
//! behind for [`Publication::stats`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::bindings::TopicBinding;
use crate::error::Result;
use crate::message::{serialize_to_vec, Message};
use crate::transport::{DeadTransport, Transport, TransportCore, TransportStats};

/// Closed connections remembered per topic; the oldest is forgotten first.
pub const MAX_DEAD_CONNECTIONS: usize = 64;

/// Outbound connections of one published topic.
pub struct Publication {
    topic: String,
    binding: ArcSwap<TopicBinding>,
    seq: AtomicU32,
    connections: Mutex<Vec<Arc<dyn Transport>>>,
    dead: Mutex<Vec<DeadTransport>>,
}

impl Publication {
    pub fn new(topic: impl Into<String>, binding: Arc<TopicBinding>) -> Self {
        Self {
            topic: topic.into(),
            binding: ArcSwap::new(binding),
            seq: AtomicU32::new(0),
            connections: Mutex::new(Vec::new()),
            dead: Mutex::new(Vec::new()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Contract currently advertised to subscribers.
    pub fn binding(&self) -> Arc<TopicBinding> {
        self.binding.load_full()
    }

    /// Replace the advertised contract. Existing connections keep theirs.
    pub fn rebind(&self, binding: Arc<TopicBinding>) {
        self.binding.store(binding);
    }

    /// Number of live subscriber connections.
    pub fn num_connections(&self) -> usize {
        self.connections.lock().len()
    }

    /// Sequence number the next published message will carry.
    pub fn next_seq(&self) -> u32 {
        self.seq.load(Ordering::Relaxed)
    }

    /// Add a subscriber transport and arrange its removal on close.
    pub fn attach(self: &Arc<Self>, transport: Arc<dyn Transport>) {
        let publication: Weak<Publication> = Arc::downgrade(self);
        self.connections.lock().push(Arc::clone(&transport));
        transport.core().set_cleanup_callback(move |core| {
            if let Some(publication) = publication.upgrade() {
                publication.remove(core);
            }
        });
        // Closed before the callback was installed: nobody will remove it.
        if transport.is_done() {
            self.remove(transport.core());
        }
    }

    /// Drop the transport behind `core` from the fan-out list, keeping a
    /// snapshot of it.
    pub fn remove(&self, core: &TransportCore) -> Option<Arc<dyn Transport>> {
        let transport = {
            let mut connections = self.connections.lock();
            let idx = connections.iter().position(|t| t.id() == core.id())?;
            let transport = connections.swap_remove(idx);
            log::debug!(
                "[publication] {} dropped subscriber #{} ({} left)",
                self.topic,
                core.id(),
                connections.len()
            );
            transport
        };
        self.bury(core);
        Some(transport)
    }

    fn bury(&self, core: &TransportCore) {
        let mut dead = self.dead.lock();
        if dead.len() >= MAX_DEAD_CONNECTIONS {
            dead.remove(0);
        }
        dead.push(DeadTransport::from_core(core));
    }

    /// Snapshots of closed connections, oldest first.
    pub fn dead_connections(&self) -> Vec<DeadTransport> {
        self.dead.lock().clone()
    }

    /// Serialize `msg` once and write it to every connection.
    ///
    /// Returns the number of connections that accepted the message. A
    /// failing connection closes itself and leaves the list.
    pub fn publish(&self, msg: &dyn Message) -> Result<usize> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let data = serialize_to_vec(msg, seq)?;

        // Snapshot: a failed write fires the cleanup callback, which locks.
        let targets: Vec<Arc<dyn Transport>> = self.connections.lock().clone();
        let mut delivered = 0;
        for transport in &targets {
            match transport.write_data(&data) {
                Ok(()) => delivered += 1,
                Err(err) => log::warn!(
                    "[publication] {} -> {} failed: {}",
                    self.topic,
                    transport.core().endpoint_id(),
                    err
                ),
            }
        }
        log::trace!(
            "[publication] {} seq={} delivered to {}/{}",
            self.topic,
            seq,
            delivered,
            targets.len()
        );
        Ok(delivered)
    }

    /// Statistics rows: live connections first, then closed ones.
    pub fn stats(&self) -> Vec<TransportStats> {
        let mut rows: Vec<TransportStats> = self
            .connections
            .lock()
            .iter()
            .map(|t| t.core().stats())
            .collect();
        rows.extend(self.dead.lock().iter().map(DeadTransport::stats));
        rows
    }

    /// Close every connection.
    pub fn close_all(&self) {
        let targets: Vec<Arc<dyn Transport>> = std::mem::take(&mut *self.connections.lock());
        for transport in targets {
            transport.close();
            self.bury(transport.core());
        }
    }
}

impl std::fmt::Debug for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publication")
            .field("topic", &self.topic)
            .field("type", &self.binding.load().type_name)
            .field("connections", &self.num_connections())
            .finish()
    }
}
