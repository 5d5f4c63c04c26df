// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-topic message contracts.
//!
//! Both sides of a handshake compare the peer's `type` and `md5sum` header
//! fields against the contract bound locally for the topic. `*` on either
//! side matches anything.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::header::{
    ConnectionHeader, FIELD_CALLERID, FIELD_ERROR, FIELD_MD5SUM, FIELD_MESSAGE_DEFINITION,
    FIELD_TOPIC, FIELD_TYPE, WILDCARD,
};
use crate::spec::MsgSpec;

/// Message contract of one topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicBinding {
    /// `package/Short`, or `*`
    pub type_name: String,
    /// Hex md5 of the message spec, or `*`
    pub md5sum: String,
    /// Verbatim message definition
    pub definition: String,
}

impl TopicBinding {
    /// Contract of `spec`. A spec without identity binds as type `*`.
    pub fn from_spec(spec: &MsgSpec) -> Self {
        let type_name = if spec.full_name.is_empty() {
            WILDCARD.to_string()
        } else {
            spec.full_name.clone()
        };
        Self {
            type_name,
            md5sum: spec.md5sum(),
            definition: spec.text().to_string(),
        }
    }

    /// Contract that accepts any peer.
    pub fn wildcard() -> Self {
        Self {
            type_name: WILDCARD.to_string(),
            md5sum: WILDCARD.to_string(),
            definition: String::new(),
        }
    }

    /// Header a subscriber sends to request `topic`.
    pub fn subscriber_header(&self, caller_id: &str, topic: &str) -> ConnectionHeader {
        ConnectionHeader::new()
            .with(FIELD_CALLERID, caller_id)
            .with(FIELD_TOPIC, topic)
            .with(FIELD_MD5SUM, self.md5sum.as_str())
            .with(FIELD_TYPE, self.type_name.as_str())
    }

    /// Header a publisher replies with.
    pub fn publisher_header(&self, caller_id: &str, topic: &str) -> ConnectionHeader {
        ConnectionHeader::new()
            .with(FIELD_CALLERID, caller_id)
            .with(FIELD_TOPIC, topic)
            .with(FIELD_MD5SUM, self.md5sum.as_str())
            .with(FIELD_TYPE, self.type_name.as_str())
            .with(FIELD_MESSAGE_DEFINITION, self.definition.as_str())
    }

    /// Check the peer's contract fields against this binding.
    pub fn check_peer(&self, topic: &str, peer: &ConnectionHeader) -> Result<()> {
        let md5sum = peer.require(FIELD_MD5SUM)?;
        if !fields_match(&self.md5sum, md5sum) {
            return Err(Error::Negotiation(format!(
                "md5sum mismatch on {}: local {} ({}), peer {} ({})",
                topic,
                self.md5sum,
                self.type_name,
                md5sum,
                peer.get(FIELD_TYPE).unwrap_or(WILDCARD)
            )));
        }
        // Older peers omit the type; the checksum already matched.
        if let Some(type_name) = peer.get(FIELD_TYPE) {
            if !fields_match(&self.type_name, type_name) {
                return Err(Error::Negotiation(format!(
                    "type mismatch on {}: local {}, peer {}",
                    topic, self.type_name, type_name
                )));
            }
        }
        Ok(())
    }
}

fn fields_match(local: &str, remote: &str) -> bool {
    local == WILDCARD || remote == WILDCARD || local == remote
}

/// Validate a publisher's reply to our subscriber header.
///
/// An `error` field or a contract mismatch is a negotiation failure.
pub(crate) fn check_publisher_reply(
    binding: &TopicBinding,
    topic: &str,
    reply: &ConnectionHeader,
) -> Result<()> {
    if let Some(reason) = reply.get(FIELD_ERROR) {
        return Err(Error::Negotiation(format!(
            "publisher rejected {}: {}",
            topic, reason
        )));
    }
    binding.check_peer(topic, reply)
}

/// Concurrent topic -> contract map owned by a handler.
#[derive(Debug, Default)]
pub struct TopicBindings {
    bindings: DashMap<String, Arc<TopicBinding>>,
}

impl TopicBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) `topic`.
    pub fn bind(&self, topic: &str, binding: TopicBinding) -> Arc<TopicBinding> {
        let binding = Arc::new(binding);
        self.bindings.insert(topic.to_string(), Arc::clone(&binding));
        binding
    }

    pub fn get(&self, topic: &str) -> Option<Arc<TopicBinding>> {
        self.bindings.get(topic).map(|b| Arc::clone(b.value()))
    }

    /// Binding of `topic`, or a wildcard contract when unbound.
    pub fn get_or_wildcard(&self, topic: &str) -> Arc<TopicBinding> {
        self.get(topic)
            .unwrap_or_else(|| Arc::new(TopicBinding::wildcard()))
    }

    pub fn unbind(&self, topic: &str) -> Option<Arc<TopicBinding>> {
        self.bindings.remove(topic).map(|(_, b)| b)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.bindings.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&self) {
        self.bindings.clear();
    }

    /// Validate a subscriber's request header on the publisher side.
    ///
    /// Returns the requested topic and its binding.
    pub fn accept_subscriber(
        &self,
        request: &ConnectionHeader,
    ) -> Result<(String, Arc<TopicBinding>)> {
        let topic = request.require(FIELD_TOPIC)?;
        let binding = self.get(topic).ok_or_else(|| {
            Error::Negotiation(format!("topic {} is not published here", topic))
        })?;
        binding.check_peer(topic, request)?;
        Ok((topic.to_string(), binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::spec::load_msg_from_str;

    const STRING_MD5: &str = "992ce8a1687cec8c8bd883ec73ca41d1";

    fn string_binding() -> TopicBinding {
        let (_, spec) = load_msg_from_str("string data\n", "String", "std_msgs").unwrap();
        TopicBinding::from_spec(&spec)
    }

    #[test]
    fn test_from_spec() {
        let binding = string_binding();
        assert_eq!(binding.type_name, "std_msgs/String");
        assert_eq!(binding.md5sum, STRING_MD5);
        assert_eq!(binding.definition, "string data\n");

        let anonymous = MsgSpec::parse("int32 x", "").unwrap();
        assert_eq!(TopicBinding::from_spec(&anonymous).type_name, "*");
    }

    #[test]
    fn test_accept_subscriber() {
        let bindings = TopicBindings::new();
        bindings.bind("/chatter", string_binding());

        let request = string_binding().subscriber_header("/listener", "/chatter");
        let (topic, binding) = bindings.accept_subscriber(&request).unwrap();
        assert_eq!(topic, "/chatter");
        assert_eq!(binding.type_name, "std_msgs/String");

        let wildcard = TopicBinding::wildcard().subscriber_header("/echo", "/chatter");
        assert!(bindings.accept_subscriber(&wildcard).is_ok());
    }

    #[test]
    fn test_accept_subscriber_rejections() {
        let bindings = TopicBindings::new();
        bindings.bind("/chatter", string_binding());

        let unknown = string_binding().subscriber_header("/listener", "/other");
        let err = bindings.accept_subscriber(&unknown).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);

        let mut bad_md5 = string_binding().subscriber_header("/listener", "/chatter");
        bad_md5.insert(FIELD_MD5SUM, "0123");
        let err = bindings.accept_subscriber(&bad_md5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);

        let mut bad_type = string_binding().subscriber_header("/listener", "/chatter");
        bad_type.insert(FIELD_TYPE, "std_msgs/Int32");
        let err = bindings.accept_subscriber(&bad_type).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);

        let missing = ConnectionHeader::new().with(FIELD_TOPIC, "/chatter");
        let err = bindings.accept_subscriber(&missing).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_publisher_reply() {
        let binding = string_binding();
        let reply = binding.publisher_header("/talker", "/chatter");
        assert!(check_publisher_reply(&binding, "/chatter", &reply).is_ok());

        let rejected = ConnectionHeader::error("no such topic");
        let err = check_publisher_reply(&binding, "/chatter", &rejected).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Negotiation);
    }

    #[test]
    fn test_bindings_map() {
        let bindings = TopicBindings::new();
        assert!(bindings.is_empty());
        bindings.bind("/a", string_binding());
        assert!(bindings.contains("/a"));
        assert_eq!(bindings.get_or_wildcard("/b").md5sum, "*");
        assert!(bindings.unbind("/a").is_some());
        assert_eq!(bindings.len(), 0);
    }
}
