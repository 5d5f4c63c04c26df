// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service specifications.
//!
//! A service is a request message and a response message written in one
//! text, separated by a line holding exactly `---`:
//!
//! ```text
//! int64 a
//! int64 b
//! ---
//! int64 sum
//! ```

use std::fmt;

use md5::{Digest, Md5};

use super::msg::MsgSpec;
use super::names;
use crate::error::{Error, Result};

/// Request/response separator line.
pub const SEPARATOR: &str = "---";

/// Structural contract of a service type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SrvSpec {
    request: MsgSpec,
    response: MsgSpec,
    text: String,
    /// Package the service belongs to (empty until assigned)
    pub package: String,
    /// Service type name without package (empty until assigned)
    pub short_name: String,
    /// `package/ShortName` (empty until assigned)
    pub full_name: String,
}

impl SrvSpec {
    /// Build a service spec from its two halves and the full source text.
    pub fn new(request: MsgSpec, response: MsgSpec, text: impl Into<String>) -> Self {
        Self {
            request,
            response,
            text: text.into(),
            package: String::new(),
            short_name: String::new(),
            full_name: String::new(),
        }
    }

    /// Parse service text, keeping it verbatim.
    pub fn parse(text: &str, package_context: &str) -> Result<Self> {
        let (request_text, response_text) = split_service_text(text)?;
        let request = MsgSpec::parse(request_text, package_context)?;
        let response = MsgSpec::parse(response_text, package_context)?;
        Ok(Self::new(request, response, text))
    }

    pub fn request(&self) -> &MsgSpec {
        &self.request
    }

    pub fn response(&self) -> &MsgSpec {
        &self.response
    }

    /// Verbatim source text spanning both halves.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Assign the service identity. The contained message specs keep their
    /// own identity.
    pub fn set_identity(&mut self, package: &str, short_name: &str) {
        self.package = package.trim_end_matches(names::SEP).to_string();
        self.short_name = short_name.to_string();
        self.full_name = names::join_package_context(&self.package, short_name);
    }

    /// Hex md5 over the request then response canonical texts.
    pub fn md5sum(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.request.md5_text().as_bytes());
        hasher.update(self.response.md5_text().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl fmt::Display for SrvSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split service text at the first `---` line.
///
/// The request half excludes the newline before the separator; the
/// response half starts right after the separator line.
pub fn split_service_text(text: &str) -> Result<(&str, &str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if content.trim_end() == SEPARATOR {
            let request = text[..offset]
                .strip_suffix('\n')
                .map(|s| s.strip_suffix('\r').unwrap_or(s))
                .unwrap_or(&text[..offset]);
            let response = &text[offset + line.len()..];
            return Ok((request, response));
        }
        offset += line.len();
    }
    Err(Error::InvalidSpec(format!(
        "service text has no '{}' separator line",
        SEPARATOR
    )))
}
