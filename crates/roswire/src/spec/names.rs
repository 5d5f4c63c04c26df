// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Graph and package resource naming rules.
//!
//! Graph names (topics, services, nodes) exposed outside a process are
//! always absolute. Package resource names have the form `package/Short`.
//!
//! ```
//! use roswire::spec::names;
//!
//! assert_eq!(names::join_package_context("foo//", "AddTwoInts"), "foo/AddTwoInts");
//! assert_eq!(names::resolve("chatter", "/ns/talker").unwrap(), "/ns/chatter");
//! ```

use crate::error::{Error, Result};

/// Graph name separator.
pub const SEP: char = '/';

/// Prefix of private (node-relative) names.
pub const PRIV_NAME: char = '~';

/// Whether `name` is absolute.
pub fn is_global(name: &str) -> bool {
    name.starts_with(SEP)
}

/// Whether `name` is private (`~name`).
pub fn is_private(name: &str) -> bool {
    name.starts_with(PRIV_NAME)
}

/// Collapse repeated separators and drop a trailing one (root stays `/`).
pub fn canonicalize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = name.split(SEP).filter(|p| !p.is_empty()).collect();
    let joined = parts.join("/");
    if is_global(name) {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Join `name` onto namespace `ns`. Global and private names are returned
/// unchanged.
pub fn ns_join(ns: &str, name: &str) -> String {
    if is_global(name) || is_private(name) || ns.is_empty() {
        return name.to_string();
    }
    if ns.ends_with(SEP) {
        format!("{}{}", ns, name)
    } else {
        format!("{}/{}", ns, name)
    }
}

/// Namespace of `name`, with a trailing separator.
pub fn namespace(name: &str) -> String {
    let canonical = canonicalize(name);
    match canonical.rfind(SEP) {
        Some(0) | None => "/".to_string(),
        Some(idx) => format!("{}/", &canonical[..idx]),
    }
}

/// Resolve `name` to an absolute name relative to the node `caller_id`.
///
/// Relative names resolve in the caller's namespace, private names under
/// the caller itself.
pub fn resolve(name: &str, caller_id: &str) -> Result<String> {
    if !caller_id.is_empty() && !is_global(caller_id) {
        return Err(Error::InvalidName(format!(
            "caller id must be absolute: {}",
            caller_id
        )));
    }
    if name.is_empty() {
        return Ok(namespace(caller_id));
    }
    if !is_legal_name(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    let resolved = if is_global(name) {
        name.to_string()
    } else if let Some(rest) = name.strip_prefix(PRIV_NAME) {
        let rest = rest.trim_start_matches(SEP);
        format!("{}/{}", canonicalize(caller_id), rest)
    } else {
        ns_join(&namespace(caller_id), name)
    };
    Ok(canonicalize(&resolved))
}

/// Join a package context and a short name, ignoring any number of
/// trailing separators on the context.
pub fn join_package_context(package_context: &str, short_name: &str) -> String {
    let package = package_context.trim_end_matches(SEP);
    if package.is_empty() {
        short_name.to_string()
    } else {
        format!("{}/{}", package, short_name)
    }
}

/// Split `package/Short` into its parts. A bare name has an empty package.
pub fn package_resource_name(name: &str) -> Result<(String, String)> {
    match name.split_once(SEP) {
        None => Ok((String::new(), name.to_string())),
        Some((package, short)) if !package.is_empty() && !short.contains(SEP) => {
            Ok((package.to_string(), short.to_string()))
        }
        Some(_) => Err(Error::InvalidName(format!(
            "not a package resource name: {}",
            name
        ))),
    }
}

/// `[A-Za-z][A-Za-z0-9_]*`
pub fn is_legal_base_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Legal graph name: optional leading `/` or `~`, then base names separated
/// by single or repeated `/`.
pub fn is_legal_name(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    let body = name
        .strip_prefix(PRIV_NAME)
        .unwrap_or(name)
        .trim_start_matches(SEP);
    if body.is_empty() {
        return name == "/";
    }
    body.split(SEP)
        .filter(|p| !p.is_empty())
        .all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
