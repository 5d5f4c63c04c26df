// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy shared by transports, protocol handlers and the spec model.
//!
//! Every fallible operation in the crate returns [`Result`]. Callers that
//! need to branch on the failure class (retry with another peer, give up,
//! report a programming error) should match on [`Error::kind`] rather than
//! on individual variants.

use std::fmt;
use std::io;

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Abstract operation invoked on a variant that provides no behavior.
    NotImplemented,
    /// No mutually acceptable protocol or message contract.
    Negotiation,
    /// Transport establishment failed (refused, timed out, unresolvable).
    Connection,
    /// Local resource acquisition failed (bind, listen, thread spawn).
    Resource,
    /// Read or write on an established transport failed irrecoverably.
    IoTerminal,
    /// Malformed input (spec text, names, headers, configuration).
    Invalid,
    /// Failure reported by the registry collaborator.
    Registry,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::Negotiation => "negotiation",
            ErrorKind::Connection => "connection",
            ErrorKind::Resource => "resource",
            ErrorKind::IoTerminal => "terminal I/O",
            ErrorKind::Invalid => "invalid input",
            ErrorKind::Registry => "registry",
        };
        f.write_str(s)
    }
}

/// Errors returned by roswire operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Contract Errors
    // ========================================================================
    /// Operation is abstract on this variant (names the operation).
    NotImplemented(&'static str),
    /// No candidate protocol is supported, or the peer rejected our contract.
    Negotiation(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Could not establish a connection to `endpoint`.
    Connection {
        /// Peer endpoint as given by the caller.
        endpoint: String,
        /// Human readable cause.
        reason: String,
    },
    /// Local bind/listen/spawn failure.
    Resource(String),
    /// Established transport failed; the transport has been closed.
    IoTerminal(String),
    /// Outgoing payload exceeds the transport's size limit.
    PayloadTooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Largest accepted size in bytes.
        max: usize,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Message or service text could not be parsed.
    InvalidSpec(String),
    /// Graph or package resource name is malformed.
    InvalidName(String),
    /// Configuration value out of range.
    InvalidConfig(String),
    /// Connection header is truncated or malformed.
    InvalidHeader(String),

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// Registry lookup or advertisement failed.
    Registry(String),
}

impl Error {
    /// Shorthand for a [`Error::Connection`] value.
    pub fn connection(endpoint: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Connection {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::Negotiation(_) => ErrorKind::Negotiation,
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Resource(_) => ErrorKind::Resource,
            Error::IoTerminal(_) | Error::PayloadTooLarge { .. } => ErrorKind::IoTerminal,
            Error::InvalidSpec(_)
            | Error::InvalidName(_)
            | Error::InvalidConfig(_)
            | Error::InvalidHeader(_) => ErrorKind::Invalid,
            Error::Registry(_) => ErrorKind::Registry,
        }
    }

    /// Whether the caller may retry (another peer, another candidate list,
    /// or the same peer after a backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Negotiation | ErrorKind::Connection | ErrorKind::Registry
        )
    }

    /// Map an I/O failure on an established transport.
    pub(crate) fn terminal(context: &str, err: &io::Error) -> Self {
        Error::IoTerminal(format!("{}: {}", context, err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotImplemented(op) => write!(f, "{} is not implemented", op),
            Error::Negotiation(msg) => write!(f, "Protocol negotiation failed: {}", msg),
            Error::Connection { endpoint, reason } => {
                write!(f, "Connection to {} failed: {}", endpoint, reason)
            }
            Error::Resource(msg) => write!(f, "Resource unavailable: {}", msg),
            Error::IoTerminal(msg) => write!(f, "Transport I/O failed: {}", msg),
            Error::PayloadTooLarge { size, max } => {
                write!(f, "Payload too large: {size} bytes exceeds limit {max}")
            }
            Error::InvalidSpec(msg) => write!(f, "Invalid spec: {}", msg),
            Error::InvalidName(name) => write!(f, "Invalid name: {}", name),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::InvalidHeader(msg) => write!(f, "Invalid connection header: {}", msg),
            Error::Registry(msg) => write!(f, "Registry error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for results using the crate [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
