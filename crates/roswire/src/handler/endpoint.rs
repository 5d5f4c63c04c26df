// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer endpoint parsing.
//!
//! Accepted forms:
//!
//! | Form | Example |
//! |------|---------|
//! | `scheme://host:port` | `tcpros://10.0.0.7:41234` |
//! | `host:port` | `robot.local:41234`, `[::1]:41234` |
//! | node name | `/talker` (resolved through the registry) |

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::registry::RegistryClient;
use crate::spec::names;

/// Where a subscriber should connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEndpoint {
    /// Direct network address.
    Address {
        /// Lowercase URI scheme, if one was given
        scheme: Option<String>,
        /// Host name or literal address (brackets stripped)
        host: String,
        /// Port
        port: u16,
    },
    /// Node name to look up in the registry.
    Node(String),
}

impl PeerEndpoint {
    /// Parse an endpoint string.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim();
        if names::is_global(endpoint) {
            return Ok(PeerEndpoint::Node(names::canonicalize(endpoint)));
        }

        let (scheme, rest) = match endpoint.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() => {
                (Some(scheme.to_ascii_lowercase()), rest)
            }
            Some(_) => return Err(invalid(endpoint, "empty scheme")),
            None => (None, endpoint),
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid(endpoint, "missing port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid(endpoint, "missing host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid(endpoint, "bad port"))?;

        Ok(PeerEndpoint::Address {
            scheme,
            host: host.to_string(),
            port,
        })
    }

    /// Resolve to a socket address for `protocol`.
    ///
    /// Node names go through `registry`. A scheme that names another
    /// protocol is a connection failure: the protocol itself was agreed.
    pub fn resolve(
        &self,
        protocol: &str,
        registry: Option<&dyn RegistryClient>,
    ) -> Result<SocketAddr> {
        match self {
            PeerEndpoint::Node(node) => {
                let registry = registry.ok_or_else(|| {
                    Error::connection(
                        node.as_str(),
                        "node endpoints need a registry to resolve",
                    )
                })?;
                let uri = registry.lookup_node(node)?;
                log::debug!("[endpoint] node {} resolved to {}", node, uri);
                match PeerEndpoint::parse(&uri)? {
                    PeerEndpoint::Node(_) => Err(Error::Registry(format!(
                        "lookup of {} returned another node name: {}",
                        node, uri
                    ))),
                    resolved => resolved.resolve(protocol, None),
                }
            }
            PeerEndpoint::Address { scheme, host, port } => {
                if let Some(scheme) = scheme {
                    if !scheme.eq_ignore_ascii_case(protocol) {
                        return Err(Error::connection(
                            format!("{}://{}:{}", scheme, host, port),
                            format!("scheme '{}' cannot carry {}", scheme, protocol),
                        ));
                    }
                }
                let display = format!("{}:{}", host, port);
                (host.as_str(), *port)
                    .to_socket_addrs()
                    .map_err(|e| Error::connection(display.as_str(), e))?
                    .next()
                    .ok_or_else(|| Error::connection(display.as_str(), "host has no addresses"))
            }
        }
    }
}

fn invalid(endpoint: &str, reason: &str) -> Error {
    Error::connection(endpoint, format!("unparseable endpoint ({})", reason))
}
