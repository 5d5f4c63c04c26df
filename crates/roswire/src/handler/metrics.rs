// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol handler metrics.
//!
//! ```
//! use roswire::handler::HandlerMetrics;
//!
//! let metrics = HandlerMetrics::new();
//! metrics.record_subscriber_accepted();
//! metrics.record_published(3);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.subscribers_accepted, 1);
//! assert_eq!(snapshot.messages_published, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters kept by each protocol handler.
#[derive(Debug)]
pub struct HandlerMetrics {
    // Publisher side
    subscribers_accepted: AtomicU64,
    handshakes_rejected: AtomicU64,
    messages_published: AtomicU64,
    deliveries: AtomicU64,

    // Subscriber side
    connections_established: AtomicU64,
    connections_failed: AtomicU64,

    start_time: Instant,
}

impl HandlerMetrics {
    pub fn new() -> Self {
        Self {
            subscribers_accepted: AtomicU64::new(0),
            handshakes_rejected: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            connections_failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// A subscriber completed the handshake.
    pub fn record_subscriber_accepted(&self) {
        self.subscribers_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// A subscriber was turned away during the handshake.
    pub fn record_handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// One message was published and reached `delivered` connections.
    pub fn record_published(&self, delivered: usize) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
    }

    /// An outbound subscriber connection was established.
    pub fn record_connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
    }

    /// An outbound subscriber connection attempt failed.
    pub fn record_connection_failed(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    pub fn snapshot(&self) -> HandlerMetricsSnapshot {
        HandlerMetricsSnapshot {
            subscribers_accepted: self.subscribers_accepted.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for HandlerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`HandlerMetrics`].
#[derive(Clone, Debug, Default)]
pub struct HandlerMetricsSnapshot {
    /// Subscribers that completed the handshake
    pub subscribers_accepted: u64,
    /// Subscribers rejected during the handshake
    pub handshakes_rejected: u64,
    /// Messages published
    pub messages_published: u64,
    /// Successful per-connection writes of published messages
    pub deliveries: u64,
    /// Outbound subscriber connections established
    pub connections_established: u64,
    /// Outbound subscriber connection attempts that failed
    pub connections_failed: u64,
    /// Seconds since the handler was created
    pub uptime_secs: f64,
}

impl HandlerMetricsSnapshot {
    /// Handshake rejection rate (0.0 - 1.0).
    pub fn rejection_rate(&self) -> f64 {
        let total = self.subscribers_accepted + self.handshakes_rejected;
        if total == 0 {
            0.0
        } else {
            self.handshakes_rejected as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = HandlerMetrics::new();
        metrics.record_subscriber_accepted();
        metrics.record_handshake_rejected();
        metrics.record_published(2);
        metrics.record_published(0);
        metrics.record_connection_established();
        metrics.record_connection_failed();

        let s = metrics.snapshot();
        assert_eq!(s.messages_published, 2);
        assert_eq!(s.deliveries, 2);
        assert_eq!(s.connections_established, 1);
        assert_eq!(s.connections_failed, 1);
        assert!((s.rejection_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_rejection_rate() {
        assert_eq!(HandlerMetricsSnapshot::default().rejection_rate(), 0.0);
    }
}
