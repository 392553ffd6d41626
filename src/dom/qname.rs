//! Qualified names and content validity
//!
//! A `QName` pairs a namespace (possibly empty) with a local name. The
//! canonical string form is bracket notation, `{namespace}local`, with the
//! braces omitted entirely for names in no namespace.

use crate::error::{Error, Result};
use memchr::memmem;
use std::fmt;
use std::str::FromStr;

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: String,
    local: String,
}

impl QName {
    /// Build a qualified name; the local part must be a valid markup name.
    pub fn new(namespace: &str, local: &str) -> Result<Self> {
        validate_name(local)?;
        Ok(QName {
            namespace: namespace.to_string(),
            local: local.to_string(),
        })
    }

    /// Build a name in no namespace.
    pub fn local(local: &str) -> Result<Self> {
        QName::new("", local)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

impl FromStr for QName {
    type Err = Error;

    /// Parse bracket notation (`{ns}local`) or a bare local name.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix('{') {
            let close = rest.find('}').ok_or_else(|| {
                Error::InvalidContent(format!("unclosed namespace brace in '{}'", s))
            })?;
            QName::new(&rest[..close], &rest[close + 1..])
        } else {
            QName::local(s)
        }
    }
}

/// Validate a markup name: alphabetic or `_` start, then alphanumerics,
/// `_`, `-`, or `.`.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidContent(format!("invalid name '{}'", name)))
    }
}

/// Validate character data against the XML 1.0 Char production.
pub fn validate_char_data(text: &str) -> Result<()> {
    let valid = text.chars().all(|c| {
        matches!(c,
            '\u{9}' | '\u{A}' | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}')
    });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidContent(
            "text contains characters outside the allowed character range".to_string(),
        ))
    }
}

/// Validate comment content: no `--` anywhere and no trailing `-`.
pub fn validate_comment(text: &str) -> Result<()> {
    validate_char_data(text)?;
    if memmem::find(text.as_bytes(), b"--").is_some() {
        return Err(Error::InvalidContent(
            "comment must not contain '--'".to_string(),
        ));
    }
    if text.ends_with('-') {
        return Err(Error::InvalidContent(
            "comment must not end with '-'".to_string(),
        ));
    }
    Ok(())
}

/// Validate a processing instruction: target is a name other than `xml`
/// (case-insensitively), and the content must not contain `?>`.
pub fn validate_processing_instruction(target: &str, data: &str) -> Result<()> {
    validate_name(target)?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(Error::InvalidContent(
            "processing-instruction target 'xml' is reserved".to_string(),
        ));
    }
    validate_char_data(data)?;
    if memmem::find(data.as_bytes(), b"?>").is_some() {
        return Err(Error::InvalidContent(
            "processing instruction must not contain '?>'".to_string(),
        ));
    }
    Ok(())
}
