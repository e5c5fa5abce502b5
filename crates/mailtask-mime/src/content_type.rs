//! `Content-Type` values and the parameter syntax shared with `Content-Disposition`.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Parsed `Content-Type` header.
///
/// The essence (`type/subtype`) is stored lowercased, so comparisons
/// against literal MIME types are exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    essence: String,
    slash: usize,
    /// Parameters keyed by lowercased name, values unquoted.
    pub parameters: BTreeMap<String, String>,
}

impl ContentType {
    /// Builds a content type from its two halves.
    #[must_use]
    pub fn new(main_type: &str, sub_type: &str) -> Self {
        let essence = format!("{main_type}/{sub_type}").to_ascii_lowercase();
        Self {
            slash: main_type.len(),
            essence,
            parameters: BTreeMap::new(),
        }
    }

    /// `text/plain; charset=us-ascii`, assumed when a part has no usable header (RFC 2045 §5.2).
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "us-ascii")
    }

    /// Sets a parameter, replacing any previous value.
    #[must_use]
    pub fn with_parameter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// `type/subtype`, lowercased.
    #[must_use]
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// The part before the slash.
    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.essence[..self.slash]
    }

    /// The part after the slash.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.essence[self.slash + 1..]
    }

    /// Looks up a parameter by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// The `boundary` parameter.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// The legacy `name` parameter some clients use instead of a disposition filename.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameter("name").filter(|n| !n.trim().is_empty())
    }

    /// Any `multipart/*` type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type() == "multipart"
    }

    /// Any `text/*` type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type() == "text"
    }

    /// Exactly `text/plain`.
    #[must_use]
    pub fn is_plain_text(&self) -> bool {
        self.essence == "text/plain"
    }

    /// Parses `type/subtype; key=value; key="quoted; value"`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidContentType`] when either half of the essence is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = split_parameters(s).into_iter();
        let head = parts.next().unwrap_or_default();
        let head = head.trim();

        let Some((main, sub)) = head.split_once('/') else {
            return Err(Error::InvalidContentType(format!("no subtype in {head:?}")));
        };
        let (main, sub) = (main.trim(), sub.trim());
        if main.is_empty() || sub.is_empty() {
            return Err(Error::InvalidContentType(format!("incomplete type {head:?}")));
        }

        Ok(Self {
            parameters: parse_parameters(parts),
            ..Self::new(main, sub)
        })
    }
}

/// Splits a header value on `;` outside double quotes.
pub(crate) fn split_parameters(s: &str) -> Vec<String> {
    let mut out = vec![String::new()];
    let mut quoted = false;

    for c in s.chars() {
        if c == ';' && !quoted {
            out.push(String::new());
            continue;
        }
        if c == '"' {
            quoted = !quoted;
        }
        if let Some(last) = out.last_mut() {
            last.push(c);
        }
    }
    out
}

/// Turns `key=value` segments into a map; segments without `=` or with an empty key are dropped.
pub(crate) fn parse_parameters(segments: impl Iterator<Item = String>) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            params.insert(key, value.trim().trim_matches('"').to_owned());
        }
    }
    params
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_ascii_whitespace() || c.is_ascii_control() || "()<>@,;:\\\"/[]?=".contains(c))
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (key, value) in &self.parameters {
            if needs_quoting(value) {
                write!(f, "; {key}=\"{}\"", value.replace('"', "\\\""))?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }
        Ok(())
    }
}
