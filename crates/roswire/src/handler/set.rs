// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered collection of protocol handlers.

use std::sync::Arc;

use super::{ProtocolDescriptor, ProtocolHandler};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Handlers in preference order.
///
/// Negotiation walks the caller's candidates first, then the handlers, so
/// the caller's protocol preference always wins over handler order.
#[derive(Clone, Default)]
pub struct HandlerSet {
    handlers: Vec<Arc<dyn ProtocolHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a handler.
    pub fn with(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.push(handler);
        self
    }

    pub fn push(&mut self, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Every supported protocol, deduplicated, in handler order.
    pub fn supported(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for handler in &self.handlers {
            for &protocol in handler.get_supported() {
                if !out.contains(&protocol) {
                    out.push(protocol);
                }
            }
        }
        out
    }

    /// First `(candidate, handler)` pair in the caller's order.
    pub fn negotiate<'a>(
        &self,
        candidates: &[&'a str],
    ) -> Result<(&'a str, Arc<dyn ProtocolHandler>)> {
        for &candidate in candidates {
            if let Some(handler) = self.handlers.iter().find(|h| h.supports(candidate)) {
                return Ok((candidate, Arc::clone(handler)));
            }
        }
        Err(Error::Negotiation(format!(
            "none of {:?} is supported (supported: {:?})",
            candidates,
            self.supported()
        )))
    }

    /// Negotiate, then open a connection with the chosen handler.
    pub fn connect(
        &self,
        topic: &str,
        peer_endpoint: &str,
        candidates: &[&str],
    ) -> Result<Arc<dyn Transport>> {
        let (protocol, handler) = self.negotiate(candidates)?;
        log::debug!(
            "[handlers] {} -> {} via {}",
            topic,
            peer_endpoint,
            protocol
        );
        handler.create_connection(topic, peer_endpoint, &[protocol])
    }

    /// Bind a publisher with the first handler supporting `protocol`.
    pub fn init_publisher(&self, topic: &str, protocol: &str) -> Result<ProtocolDescriptor> {
        let (_, handler) = self.negotiate(&[protocol])?;
        handler.init_publisher(topic, protocol)
    }

    /// Shut every handler down.
    pub fn shutdown(&self) {
        for handler in &self.handlers {
            handler.shutdown();
        }
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("supported", &self.supported())
            .finish()
    }
}
