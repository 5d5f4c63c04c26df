// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry client boundary.
//!
//! Handlers never talk to the master themselves: they receive a
//! [`RegistryClient`] and use it to resolve topics and node names.
//! [`StaticRegistry`] keeps everything in memory for tests and
//! single-process setups.

use std::fmt;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::handler::ProtocolDescriptor;
use crate::header::WILDCARD;
use crate::spec::names;

/// Registry answer for one topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicInfo {
    /// Message type (`pkg/Type`, or `*` when unknown)
    pub type_name: String,
    /// Canonical topic name
    pub resolved_name: String,
    /// Peer endpoints publishing the topic (URIs or node names)
    pub publishers: Vec<String>,
}

/// Topic and node lookup service.
pub trait RegistryClient: Send + Sync {
    /// Resolve `topic` to its type and current publishers.
    fn resolve_topic(&self, topic: &str) -> Result<TopicInfo>;

    /// Register `descriptor` as a publisher of `topic` with type `type_name`.
    fn advertise(&self, topic: &str, type_name: &str, descriptor: &ProtocolDescriptor)
        -> Result<()>;

    /// URI of node `node`.
    fn lookup_node(&self, node: &str) -> Result<String>;
}

impl fmt::Debug for dyn RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RegistryClient")
    }
}

#[derive(Clone, Debug)]
struct TopicEntry {
    type_name: String,
    publishers: Vec<String>,
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    topics: DashMap<String, TopicEntry>,
    nodes: DashMap<String, String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map node `name` to `uri`. Replaces a previous registration.
    pub fn register_node(&self, name: &str, uri: impl Into<String>) {
        self.nodes.insert(names::canonicalize(name), uri.into());
    }

    /// Add `endpoint` to the publishers of `topic`.
    ///
    /// Fails with a Registry error when the topic is already known under
    /// another concrete type.
    pub fn add_publisher(
        &self,
        topic: &str,
        type_name: &str,
        endpoint: impl Into<String>,
    ) -> Result<()> {
        let endpoint = endpoint.into();
        let mut entry = self
            .topics
            .entry(names::canonicalize(topic))
            .or_insert_with(|| TopicEntry {
                type_name: WILDCARD.to_string(),
                publishers: Vec::new(),
            });

        if entry.type_name == WILDCARD {
            entry.type_name = type_name.to_string();
        } else if type_name != WILDCARD && entry.type_name != type_name {
            return Err(Error::Registry(format!(
                "{} is registered as {}, not {}",
                topic, entry.type_name, type_name
            )));
        }
        if !entry.publishers.contains(&endpoint) {
            entry.publishers.push(endpoint);
        }
        Ok(())
    }

    /// Drop `endpoint` from the publishers of `topic`.
    pub fn remove_publisher(&self, topic: &str, endpoint: &str) -> bool {
        match self.topics.get_mut(&names::canonicalize(topic)) {
            Some(mut entry) => {
                let before = entry.publishers.len();
                entry.publishers.retain(|p| p != endpoint);
                entry.publishers.len() != before
            }
            None => false,
        }
    }

    pub fn num_topics(&self) -> usize {
        self.topics.len()
    }
}

impl RegistryClient for StaticRegistry {
    fn resolve_topic(&self, topic: &str) -> Result<TopicInfo> {
        let resolved_name = names::canonicalize(topic);
        let entry = self
            .topics
            .get(&resolved_name)
            .ok_or_else(|| Error::Registry(format!("unknown topic {}", topic)))?;
        Ok(TopicInfo {
            type_name: entry.type_name.clone(),
            resolved_name,
            publishers: entry.publishers.clone(),
        })
    }

    fn advertise(
        &self,
        topic: &str,
        type_name: &str,
        descriptor: &ProtocolDescriptor,
    ) -> Result<()> {
        self.add_publisher(topic, type_name, descriptor.uri())?;
        log::debug!("[registry] {} advertised at {}", topic, descriptor.uri());
        Ok(())
    }

    fn lookup_node(&self, node: &str) -> Result<String> {
        self.nodes
            .get(&names::canonicalize(node))
            .map(|uri| uri.value().clone())
            .ok_or_else(|| Error::Registry(format!("unknown node {}", node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_unknown_topic_and_node() {
        let registry = StaticRegistry::new();
        assert_eq!(
            registry.resolve_topic("/nothing").unwrap_err().kind(),
            ErrorKind::Registry
        );
        assert_eq!(
            registry.lookup_node("/nobody").unwrap_err().kind(),
            ErrorKind::Registry
        );
    }

    #[test]
    fn test_advertise_then_resolve() {
        let registry = StaticRegistry::new();
        let desc = ProtocolDescriptor::new("TCPROS", "127.0.0.1", 4000);
        registry
            .advertise("/chatter", "std_msgs/String", &desc)
            .unwrap();
        registry
            .advertise("/chatter", "std_msgs/String", &desc)
            .unwrap();

        let info = registry.resolve_topic("/chatter/").unwrap();
        assert_eq!(info.resolved_name, "/chatter");
        assert_eq!(info.type_name, "std_msgs/String");
        assert_eq!(info.publishers, vec!["tcpros://127.0.0.1:4000".to_string()]);
    }

    #[test]
    fn test_type_conflict() {
        let registry = StaticRegistry::new();
        registry
            .add_publisher("/chatter", WILDCARD, "/talker")
            .unwrap();
        registry
            .add_publisher("/chatter", "std_msgs/String", "/talker2")
            .unwrap();
        let err = registry
            .add_publisher("/chatter", "std_msgs/Int32", "/talker3")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registry);
        assert_eq!(
            registry.resolve_topic("/chatter").unwrap().type_name,
            "std_msgs/String"
        );
    }

    #[test]
    fn test_remove_publisher() {
        let registry = StaticRegistry::new();
        registry
            .add_publisher("/chatter", "std_msgs/String", "/talker")
            .unwrap();
        assert!(registry.remove_publisher("/chatter", "/talker"));
        assert!(!registry.remove_publisher("/chatter", "/talker"));
        assert!(registry.resolve_topic("/chatter").unwrap().publishers.is_empty());
    }

    #[test]
    fn test_node_names_canonicalized() {
        let registry = StaticRegistry::new();
        registry.register_node("//talker/", "tcpros://10.0.0.1:1234");
        assert_eq!(
            registry.lookup_node("/talker").unwrap(),
            "tcpros://10.0.0.1:1234"
        );
    }
}
