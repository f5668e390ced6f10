//! SDP attribute set
//!
//! Every `a=` line of a body is kept, in order, as a `(name, value)` entry.
//! Names may repeat (`candidate`, `rtpmap`, `fmtp`), so lookups are either
//! "first occurrence" or "Nth occurrence". The codec and candidate parsers
//! both read from this set rather than from raw text.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SdpError};

/// Attributes that carry no value (RFC 8866 property attributes and the ICE
/// flags that follow the same shape)
const PROPERTY_ATTRIBUTES: &[&str] = &[
    "inactive",
    "sendrecv",
    "sendonly",
    "recvonly",
    "rtcp-mux",
    "rtcp-rsize",
    "ice-lite",
    "ice-mismatch",
    "end-of-candidates",
];

/// A single `a=` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpAttribute {
    pub name: String,
    pub value: Option<String>,
}

/// Ordered, key-repeatable mapping of attribute name to raw value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpAttributes {
    entries: Vec<SdpAttribute>,
}

impl SdpAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping any earlier entry with the same name
    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.entries.push(SdpAttribute {
            name: name.into(),
            value,
        });
    }

    /// Parse the value part of an `a=` line (everything after `a=`)
    pub fn push_line(&mut self, line: &str) -> Result<()> {
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (line.trim(), None),
        };

        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(SdpError::malformed_attribute(format!("a={}", line)));
        }
        if value.is_none() && !PROPERTY_ATTRIBUTES.contains(&name) {
            warn!("SDP attribute without ':' separator: a={}", line);
            return Err(SdpError::malformed_attribute(format!("a={}", line)));
        }

        self.push(name, value);
        Ok(())
    }

    /// Value of the first attribute with this name.
    ///
    /// Property attributes have no value; use [`SdpAttributes::contains`] for them.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.find_nth(name, 0)
    }

    /// Value of the `n`th (zero-based) attribute with this name
    pub fn find_nth(&self, name: &str, n: usize) -> Option<&str> {
        self.entries
            .iter()
            .filter(|a| a.name == name)
            .nth(n)
            .and_then(|a| a.value.as_deref())
    }

    /// Every value carried by attributes with this name, in order
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |a| a.name == name)
            .filter_map(|a| a.value.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SdpAttribute> {
        self.entries.iter()
    }
}
