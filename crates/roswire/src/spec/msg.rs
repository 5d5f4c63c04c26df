// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message specifications.
//!
//! A [`MsgSpec`] is the structural contract of one message type: ordered
//! fields (parallel `types` and `names`), constants, and the verbatim source
//! text. Content is fixed at construction; the identity fields (`package`,
//! `short_name`, `full_name`) stay public so a loader can re-home a spec
//! under its package-qualified name.
//!
//! # Text Format
//!
//! ```text
//! # comment
//! int32 X=123            <- constant
//! string NAME=a # b      <- string constant, value is "a # b"
//! Header header          <- field, resolves to std_msgs/Header
//! geometry_msgs/Point[] points
//! ```

use std::fmt;

use md5::{Digest, Md5};

use super::names;
use crate::error::{Error, Result};

/// Comment marker in message text.
pub const COMMENT_CHAR: char = '#';

/// Constant assignment marker in message text.
pub const CONST_CHAR: char = '=';

/// Fully-qualified type of the standard header.
pub const HEADER_TYPE: &str = "std_msgs/Header";

/// Primitive field types.
pub const PRIMITIVE_TYPES: [&str; 16] = [
    "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64", "uint64", "float32",
    "float64", "string", "bool", "char", "byte", "time", "duration",
];

/// Whether `type_name` (without array suffix) is a primitive.
pub fn is_primitive(type_name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&base_type(type_name))
}

/// Strip an array suffix: `int32[4]` -> `int32`.
pub fn base_type(type_name: &str) -> &str {
    match type_name.find('[') {
        Some(idx) => &type_name[..idx],
        None => type_name,
    }
}

/// Whether `type_name` carries an array suffix.
pub fn is_array(type_name: &str) -> bool {
    type_name.ends_with(']')
}

// ============================================================================
// Constants
// ============================================================================

/// A constant declaration (`type NAME=value`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Constant {
    /// Primitive type of the constant
    pub type_name: String,
    /// Constant name
    pub name: String,
    /// Normalized value (trimmed; string constants keep inner text as-is)
    pub value: String,
    /// Source line the constant was declared on
    pub text: String,
}

impl Constant {
    pub fn new(
        type_name: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            value: value.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}={}", self.type_name, self.name, self.value)
    }
}

// ============================================================================
// MsgSpec
// ============================================================================

/// Structural contract of a message type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MsgSpec {
    types: Vec<String>,
    names: Vec<String>,
    constants: Vec<Constant>,
    text: String,
    /// Package the spec belongs to (empty until assigned)
    pub package: String,
    /// Type name without package (empty until assigned)
    pub short_name: String,
    /// `package/ShortName` (empty until assigned)
    pub full_name: String,
}

impl MsgSpec {
    /// Build a spec from already-parsed components.
    ///
    /// Fails if `types` and `names` differ in length.
    pub fn new(
        types: Vec<String>,
        names: Vec<String>,
        constants: Vec<Constant>,
        text: impl Into<String>,
    ) -> Result<Self> {
        if types.len() != names.len() {
            return Err(Error::InvalidSpec(format!(
                "{} field types but {} field names",
                types.len(),
                names.len()
            )));
        }
        Ok(Self {
            types,
            names,
            constants,
            text: text.into(),
            package: String::new(),
            short_name: String::new(),
            full_name: String::new(),
        })
    }

    /// Parse message text. Bare non-primitive types are qualified with
    /// `package_context` when it is non-empty.
    pub fn parse(text: &str, package_context: &str) -> Result<Self> {
        let package = package_context.trim_end_matches(names::SEP);
        let mut types = Vec::new();
        let mut field_names = Vec::new();
        let mut constants = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let parsed = parse_line(line, package).map_err(|e| match e {
                Error::InvalidSpec(msg) => {
                    Error::InvalidSpec(format!("line {}: {}", lineno + 1, msg))
                }
                other => other,
            })?;
            match parsed {
                Line::Blank => {}
                Line::Constant(c) => constants.push(c),
                Line::Field(type_name, name) => {
                    if field_names.contains(&name) {
                        return Err(Error::InvalidSpec(format!(
                            "line {}: duplicate field name '{}'",
                            lineno + 1,
                            name
                        )));
                    }
                    types.push(type_name);
                    field_names.push(name);
                }
            }
        }

        Self::new(types, field_names, constants, text)
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Field types, parallel to [`Self::names`].
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Field names, parallel to [`Self::types`].
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// Verbatim source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `(type, name)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.types
            .iter()
            .map(String::as_str)
            .zip(self.names.iter().map(String::as_str))
    }

    /// Whether the first field is a standard header.
    pub fn has_header(&self) -> bool {
        matches!(self.fields().next(), Some((HEADER_TYPE, "header")))
    }

    /// Assign identity from a package and short name.
    pub fn set_identity(&mut self, package: &str, short_name: &str) {
        self.package = package.trim_end_matches(names::SEP).to_string();
        self.short_name = short_name.to_string();
        self.full_name = names::join_package_context(&self.package, short_name);
    }

    // ========================================================================
    // Checksum
    // ========================================================================

    /// Canonical text the checksum is computed over: constants first, then
    /// fields, one declaration per line, comments and blank lines removed.
    pub fn md5_text(&self) -> String {
        let mut lines: Vec<String> = self.constants.iter().map(|c| c.to_string()).collect();
        lines.extend(self.fields().map(|(t, n)| format!("{} {}", t, n)));
        lines.join("\n")
    }

    /// Hex md5 of [`Self::md5_text`]; identifies the wire contract.
    pub fn md5sum(&self) -> String {
        let digest = Md5::digest(self.md5_text().as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for MsgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ============================================================================
// Line parser
// ============================================================================

enum Line {
    Blank,
    Constant(Constant),
    Field(String, String),
}

fn parse_line(line: &str, package: &str) -> Result<Line> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_CHAR) {
        return Ok(Line::Blank);
    }

    let (type_token, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((t, r)) => (t, r.trim_start()),
        None => {
            return Err(Error::InvalidSpec(format!(
                "expected '<type> <name>', got '{}'",
                trimmed
            )))
        }
    };

    // String constants keep everything after '=' (comment markers included).
    if type_token == "string" {
        if let Some((name, value)) = rest.split_once(CONST_CHAR) {
            return constant(type_token, name.trim(), value.trim(), line);
        }
    }

    let content = match rest.find(COMMENT_CHAR) {
        Some(idx) => rest[..idx].trim(),
        None => rest.trim(),
    };

    if let Some((name, value)) = content.split_once(CONST_CHAR) {
        return constant(type_token, name.trim(), value.trim(), line);
    }

    if content.split_whitespace().count() != 1 {
        return Err(Error::InvalidSpec(format!(
            "expected '<type> <name>', got '{}'",
            trimmed
        )));
    }
    if !names::is_legal_base_name(content) {
        return Err(Error::InvalidSpec(format!("illegal field name '{}'", content)));
    }
    let type_name = resolve_type(type_token, package)?;
    Ok(Line::Field(type_name, content.to_string()))
}

fn constant(type_name: &str, name: &str, value: &str, line: &str) -> Result<Line> {
    if is_array(type_name) || !is_primitive(type_name) || matches!(type_name, "time" | "duration")
    {
        return Err(Error::InvalidSpec(format!(
            "constant type '{}' must be a primitive scalar",
            type_name
        )));
    }
    if !names::is_legal_base_name(name) {
        return Err(Error::InvalidSpec(format!("illegal constant name '{}'", name)));
    }
    check_constant_value(type_name, value)?;
    Ok(Line::Constant(Constant::new(type_name, name, value, line)))
}

fn check_constant_value(type_name: &str, value: &str) -> Result<()> {
    let ok = match type_name {
        "int8" => value.parse::<i8>().is_ok(),
        "uint8" | "byte" | "char" => value.parse::<u8>().is_ok(),
        "int16" => value.parse::<i16>().is_ok(),
        "uint16" => value.parse::<u16>().is_ok(),
        "int32" => value.parse::<i32>().is_ok(),
        "uint32" => value.parse::<u32>().is_ok(),
        "int64" => value.parse::<i64>().is_ok(),
        "uint64" => value.parse::<u64>().is_ok(),
        "float32" | "float64" => value.parse::<f64>().is_ok(),
        "bool" => matches!(value, "True" | "False" | "true" | "false" | "0" | "1"),
        "string" => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidSpec(format!(
            "invalid {} constant value '{}'",
            type_name, value
        )))
    }
}

fn resolve_type(type_token: &str, package: &str) -> Result<String> {
    let base = base_type(type_token);
    let suffix = &type_token[base.len()..];
    if !suffix.is_empty() {
        let inner = suffix
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| Error::InvalidSpec(format!("bad array suffix in '{}'", type_token)))?;
        if !inner.is_empty() && inner.parse::<usize>().is_err() {
            return Err(Error::InvalidSpec(format!(
                "bad array length in '{}'",
                type_token
            )));
        }
    }

    let (pkg, short) = names::package_resource_name(base)
        .map_err(|_| Error::InvalidSpec(format!("illegal type '{}'", type_token)))?;
    if !names::is_legal_base_name(&short) || (!pkg.is_empty() && !names::is_legal_base_name(&pkg))
    {
        return Err(Error::InvalidSpec(format!("illegal type '{}'", type_token)));
    }

    let resolved = if !pkg.is_empty() || PRIMITIVE_TYPES.contains(&base) {
        base.to_string()
    } else if base == "Header" {
        HEADER_TYPE.to_string()
    } else if package.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", package, base)
    };
    Ok(format!("{}{}", resolved, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(types: &[&str], names: &[&str], text: &str) -> MsgSpec {
        MsgSpec::new(
            types.iter().map(|s| s.to_string()).collect(),
            names.iter().map(|s| s.to_string()).collect(),
            Vec::new(),
            text,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        let err = MsgSpec::new(vec!["int32".into()], vec![], vec![], "int32").unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn test_identity_defaults_empty() {
        let spec = simple(&["int32"], &["a"], "int32 a");
        assert_eq!(spec.package, "");
        assert_eq!(spec.short_name, "");
        assert_eq!(spec.full_name, "");
        assert_eq!(spec.to_string(), "int32 a");
    }

    #[test]
    fn test_equality_includes_identity() {
        let a = simple(&["int32"], &["a"], "int32 a");
        let mut b = simple(&["int32"], &["a"], "int32 a");
        assert_eq!(a, b);

        b.full_name = "x/Y".into();
        assert_ne!(a, b);
        b.full_name.clear();
        assert_eq!(a, b);

        b.short_name = "Y".into();
        assert_ne!(a, b);
        b.short_name.clear();
        assert_eq!(a, b);

        b.package = "x".into();
        assert_ne!(a, b);
        b.package.clear();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_on_content() {
        let a = simple(&["int32"], &["a"], "int32 a");
        assert_ne!(a, simple(&["int64"], &["a"], "int32 a"));
        assert_ne!(a, simple(&["int32"], &["b"], "int32 a"));
        assert_ne!(a, simple(&["int32"], &["a"], "int32  a"));
    }

    #[test]
    fn test_parse_fields_and_constants() {
        let text = "# leading comment\n\
                    int32 X=123 # trailing\n\
                    string NAME=hello # kept\n\
                    Header header\n\
                    \n\
                    float64[3] position  # xyz\n\
                    Point[] points\n\
                    geometry_msgs/Quaternion orientation\n";
        let spec = MsgSpec::parse(text, "my_pkg/").unwrap();

        assert_eq!(
            spec.types(),
            &[
                "std_msgs/Header",
                "float64[3]",
                "my_pkg/Point[]",
                "geometry_msgs/Quaternion"
            ]
        );
        assert_eq!(spec.names(), &["header", "position", "points", "orientation"]);
        assert_eq!(spec.constants().len(), 2);
        assert_eq!(spec.constants()[0].value, "123");
        assert_eq!(spec.constants()[1].value, "hello # kept");
        assert_eq!(spec.text(), text);
        assert!(spec.has_header());
    }

    #[test]
    fn test_parse_errors() {
        assert!(MsgSpec::parse("int32", "").is_err());
        assert!(MsgSpec::parse("int32 a b", "").is_err());
        assert!(MsgSpec::parse("int32 1a", "").is_err());
        assert!(MsgSpec::parse("int32[x] a", "").is_err());
        assert!(MsgSpec::parse("int32 a\nint64 a", "").is_err());
        assert!(MsgSpec::parse("int8 X=300", "").is_err());
        assert!(MsgSpec::parse("Point X=1", "").is_err());
        assert!(MsgSpec::parse("a/b/c x", "").is_err());
    }

    #[test]
    fn test_md5_ignores_comments_and_spacing() {
        let a = MsgSpec::parse("int32 X=1\nint64 a\nstring b", "").unwrap();
        let b = MsgSpec::parse("# doc\nint32 X=1   # one\n\nint64   a\nstring b # name", "").unwrap();
        assert_eq!(a.md5_text(), "int32 X=1\nint64 a\nstring b");
        assert_eq!(a.md5sum(), b.md5sum());
        assert_eq!(a.md5sum().len(), 32);

        let c = MsgSpec::parse("int32 X=1\nint64 a\nstring c", "").unwrap();
        assert_ne!(a.md5sum(), c.md5sum());
    }

    #[test]
    fn test_md5_of_string_message() {
        // std_msgs/String
        let spec = MsgSpec::parse("string data\n", "std_msgs").unwrap();
        assert_eq!(spec.md5sum(), "992ce8a1687cec8c8bd883ec73ca41d1");
    }

    #[test]
    fn test_set_identity() {
        let mut spec = simple(&["string"], &["data"], "string data");
        spec.set_identity("std_msgs//", "String");
        assert_eq!(spec.package, "std_msgs");
        assert_eq!(spec.short_name, "String");
        assert_eq!(spec.full_name, "std_msgs/String");
    }
}
