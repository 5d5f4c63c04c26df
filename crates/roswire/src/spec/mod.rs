// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message and service specification model.
//!
//! Specs are the typed contract a transport carries: protocol handlers
//! compare checksums of the local and remote specs during the connection
//! handshake.
//!
//! # Modules
//!
//! - `msg` - [`MsgSpec`] and [`Constant`]
//! - `srv` - [`SrvSpec`]
//! - `names` - Graph and package resource naming rules
//!
//! # Example
//!
//! ```
//! use roswire::spec::load_srv_from_str;
//!
//! let text = "int64 a\nint64 b\n---\nint64 sum\n";
//! let (name, spec) = load_srv_from_str(text, "AddTwoInts", "rospy_tutorials/").unwrap();
//! assert_eq!(name, "rospy_tutorials/AddTwoInts");
//! assert_eq!(spec.text(), text);
//! ```

pub mod msg;
pub mod names;
pub mod srv;

pub use msg::{Constant, MsgSpec};
pub use srv::SrvSpec;

use crate::error::{Error, Result};

/// Either kind of spec, for collections holding both.
///
/// Specs of different kinds never compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Spec {
    Msg(MsgSpec),
    Srv(SrvSpec),
}

impl Spec {
    /// Fully-qualified name of the wrapped spec.
    pub fn full_name(&self) -> &str {
        match self {
            Spec::Msg(m) => &m.full_name,
            Spec::Srv(s) => &s.full_name,
        }
    }

    /// Verbatim source text of the wrapped spec.
    pub fn text(&self) -> &str {
        match self {
            Spec::Msg(m) => m.text(),
            Spec::Srv(s) => s.text(),
        }
    }

    /// Checksum of the wrapped spec.
    pub fn md5sum(&self) -> String {
        match self {
            Spec::Msg(m) => m.md5sum(),
            Spec::Srv(s) => s.md5sum(),
        }
    }
}

impl From<MsgSpec> for Spec {
    fn from(spec: MsgSpec) -> Self {
        Spec::Msg(spec)
    }
}

impl From<SrvSpec> for Spec {
    fn from(spec: SrvSpec) -> Self {
        Spec::Srv(spec)
    }
}

fn check_short_name(short_name: &str) -> Result<()> {
    if names::is_legal_base_name(short_name) {
        Ok(())
    } else {
        Err(Error::InvalidName(format!(
            "illegal type short name '{}'",
            short_name
        )))
    }
}

/// Parse message text and assign its identity.
///
/// Returns `(resolved_name, spec)` where `resolved_name` is
/// `package/ShortName`, or `ShortName` without a package context.
pub fn load_msg_from_str(
    text: &str,
    short_name: &str,
    package_context: &str,
) -> Result<(String, MsgSpec)> {
    check_short_name(short_name)?;
    let mut spec = MsgSpec::parse(text, package_context)?;
    spec.set_identity(package_context, short_name);
    log::trace!("[spec] loaded message {}", spec.full_name);
    Ok((spec.full_name.clone(), spec))
}

/// Parse service text and assign its identity.
///
/// Same naming rules as [`load_msg_from_str`]. The request and response
/// halves are named `<ShortName>Request` and `<ShortName>Response`.
pub fn load_srv_from_str(
    text: &str,
    short_name: &str,
    package_context: &str,
) -> Result<(String, SrvSpec)> {
    check_short_name(short_name)?;
    let (request_text, response_text) = srv::split_service_text(text)?;

    let mut request = MsgSpec::parse(request_text, package_context)?;
    request.set_identity(package_context, &format!("{}Request", short_name));
    let mut response = MsgSpec::parse(response_text, package_context)?;
    response.set_identity(package_context, &format!("{}Response", short_name));

    let mut spec = SrvSpec::new(request, response, text);
    spec.set_identity(package_context, short_name);
    log::trace!("[spec] loaded service {}", spec.full_name);
    Ok((spec.full_name.clone(), spec))
}
