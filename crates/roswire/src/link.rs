// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry-driven wiring of topics to transports.
//!
//! ```text
//! subscribe(topic)                         advertise(topic)
//!   registry.resolve_topic                   handlers.init_publisher
//!   for each publisher:                      registry.advertise(descriptor)
//!     handlers.connect(peer, candidates)
//!   -> Linked { transports, failures }
//!   -> Subscription (one receive thread per transport -> channel)
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{Error, Result};
use crate::handler::{HandlerSet, ProtocolDescriptor};
use crate::registry::RegistryClient;
use crate::transport::Transport;

/// Outcome of [`subscribe`]: one entry per publisher the registry returned.
#[derive(Debug, Default)]
pub struct Linked {
    /// Established inbound transports.
    pub transports: Vec<Arc<dyn Transport>>,
    /// Publishers that could not be reached, with the reason.
    pub failures: Vec<(String, Error)>,
}

impl Linked {
    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

/// Resolve `topic` and connect to each of its publishers.
///
/// A failing peer does not abort the others. Only registry errors and an
/// empty candidate list fail the whole call.
pub fn subscribe(
    registry: &dyn RegistryClient,
    handlers: &HandlerSet,
    topic: &str,
    candidates: &[&str],
) -> Result<Linked> {
    if candidates.is_empty() {
        return Err(Error::Negotiation(format!(
            "no protocol candidates for {}",
            topic
        )));
    }
    let info = registry.resolve_topic(topic)?;
    let mut linked = Linked::default();
    for peer in &info.publishers {
        match handlers.connect(&info.resolved_name, peer, candidates) {
            Ok(transport) => linked.transports.push(transport),
            Err(err) => {
                log::warn!("[link] {} from {}: {}", info.resolved_name, peer, err);
                linked.failures.push((peer.clone(), err));
            }
        }
    }
    log::debug!(
        "[link] {} ({}): {} connected, {} failed",
        info.resolved_name,
        info.type_name,
        linked.transports.len(),
        linked.failures.len()
    );
    Ok(linked)
}

/// Start publishing `topic` over `protocol` and register the descriptor.
pub fn advertise(
    registry: &dyn RegistryClient,
    handlers: &HandlerSet,
    topic: &str,
    type_name: &str,
    protocol: &str,
) -> Result<ProtocolDescriptor> {
    let descriptor = handlers.init_publisher(topic, protocol)?;
    registry.advertise(topic, type_name, &descriptor)?;
    Ok(descriptor)
}

/// One message received by a [`Subscription`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Id of the transport it arrived on
    pub transport_id: u64,
    /// Caller id of the sending node
    pub endpoint_id: String,
    pub data: Vec<u8>,
}

/// Receive loops of a set of inbound transports merged into one channel.
///
/// Dropping the subscription closes every transport and joins the threads.
pub struct Subscription {
    transports: Vec<Arc<dyn Transport>>,
    threads: Vec<JoinHandle<()>>,
    rx: Receiver<Delivery>,
}

impl Subscription {
    /// Spawn one receive thread per transport.
    pub fn start(transports: Vec<Arc<dyn Transport>>) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let mut subscription = Self {
            transports: Vec::with_capacity(transports.len()),
            threads: Vec::with_capacity(transports.len()),
            rx,
        };
        for transport in transports {
            subscription.add(transport, tx.clone())?;
        }
        Ok(subscription)
    }

    fn add(&mut self, transport: Arc<dyn Transport>, tx: Sender<Delivery>) -> Result<()> {
        let worker = Arc::clone(&transport);
        let handle = thread::Builder::new()
            .name("roswire-sub-recv".to_string())
            .spawn(move || {
                let id = worker.id();
                let endpoint_id = worker.core().endpoint_id();
                let result = worker.receive_loop(&mut |data| {
                    let _ = tx.send(Delivery {
                        transport_id: id,
                        endpoint_id: endpoint_id.clone(),
                        data,
                    });
                });
                if let Err(err) = result {
                    log::debug!("[link] {} #{} ended: {}", worker.core().name(), id, err);
                }
            })
            .map_err(|e| {
                transport.close();
                Error::Resource(format!("spawn receive thread: {}", e))
            })?;
        self.transports.push(transport);
        self.threads.push(handle);
        Ok(())
    }

    /// Next delivery, waiting at most `timeout`.
    ///
    /// `None` on timeout or once every transport has closed and the
    /// backlog is drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Delivery> {
        match self.rx.recv_timeout(timeout) {
            Ok(delivery) => Some(delivery),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<Delivery> {
        match self.rx.try_recv() {
            Ok(delivery) => Some(delivery),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    /// Number of transports still open.
    pub fn num_live(&self) -> usize {
        self.transports.iter().filter(|t| !t.is_done()).count()
    }

    /// Close every transport and wait for the receive threads.
    pub fn close(&mut self) {
        for transport in &self.transports {
            transport.close();
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("[link] receive thread panicked");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("transports", &self.transports.len())
            .field("live", &self.num_live())
            .field("pending", &self.rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::message::Message;
    use crate::registry::StaticRegistry;
    use crate::transport::{Direction, TransportCore};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Inbound transport replaying a fixed script, then closing.
    struct Scripted {
        core: TransportCore,
        script: Mutex<VecDeque<Vec<u8>>>,
    }

    impl Scripted {
        fn new(messages: &[&[u8]]) -> Arc<Self> {
            let core = TransportCore::named(Direction::Inbound, "/chatter");
            core.set_endpoint_id("/talker");
            Arc::new(Self {
                core,
                script: Mutex::new(messages.iter().map(|m| m.to_vec()).collect()),
            })
        }
    }

    impl Transport for Scripted {
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
            if self.is_done() {
                return Ok(None);
            }
            match self.script.lock().pop_front() {
                Some(msg) => Ok(Some(msg)),
                None => {
                    self.close();
                    Ok(None)
                }
            }
        }
    }

    #[test]
    fn test_subscription_merges_transports() {
        let a = Scripted::new(&[b"a1", b"a2"]);
        let b = Scripted::new(&[b"b1"]);
        let ids = (a.id(), b.id());
        let sub = Subscription::start(vec![a as Arc<dyn Transport>, b as Arc<dyn Transport>]).unwrap();

        let mut got = Vec::new();
        while let Some(d) = sub.recv_timeout(Duration::from_secs(2)) {
            assert_eq!(d.endpoint_id, "/talker");
            got.push((d.transport_id, d.data));
            if got.len() == 3 {
                break;
            }
        }
        assert_eq!(got.len(), 3);
        let from_a: Vec<_> = got.iter().filter(|(id, _)| *id == ids.0).collect();
        assert_eq!(from_a[0].1, b"a1");
        assert_eq!(from_a[1].1, b"a2");
    }

    #[test]
    fn test_subscribe_unknown_topic() {
        let registry = StaticRegistry::new();
        let err = subscribe(&registry, &HandlerSet::new(), "/chatter", &["TCPROS"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registry);
    }

    #[test]
    fn test_subscribe_collects_failures() {
        let registry = StaticRegistry::new();
        registry
            .add_publisher("/chatter", "std_msgs/String", "tcpros://127.0.0.1:1")
            .unwrap();
        // No handler supports anything: every peer fails negotiation.
        let linked = subscribe(&registry, &HandlerSet::new(), "/chatter", &["TCPROS"]).unwrap();
        assert!(linked.is_empty());
        assert_eq!(linked.failures.len(), 1);
        assert_eq!(linked.failures[0].1.kind(), ErrorKind::Negotiation);
    }

    #[test]
    fn test_subscribe_needs_candidates() {
        let registry = StaticRegistry::new();
        let err = subscribe(&registry, &HandlerSet::new(), "/chatter", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);
    }
}
