// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DSN parsing for source and output specifications.
//!
//! A DSN is an absolute, hierarchical URI of the form
//! `scheme://value[?key[=val]&key2=val2...]`. Sources and outputs are both
//! described this way, e.g. `file:///etc/pools.json?period=5s` or
//! `file:///run/pools.json?uid=1000&mode=0640`.
//!
//! # Example
//!
//! ```rust
//! use poolwatch::dsn::Dsn;
//!
//! let dsn = Dsn::parse("file:///etc/pools.json?period=5s&debug").unwrap();
//! assert_eq!(dsn.protocol(), "file");
//! assert_eq!(dsn.value(), "/etc/pools.json");
//! assert_eq!(dsn.parameter("period"), Some(Some("5s")));
//! assert_eq!(dsn.parameter("debug"), Some(None));
//! assert_eq!(dsn.parameter("missing"), None);
//! ```

use crate::errors::DsnError;
use percent_encoding::percent_decode_str;
use url::Url;

/// A parsed `scheme://value?params` descriptor string.
///
/// `value` is the authority followed by the path, so `file:///a/b` yields `/a/b`
/// and `scheme://host/path` yields `host/path`. Query parameters keep their
/// order and may repeat; a parameter without `=` has no value, which is distinct
/// from an empty value. Percent-escapes are decoded in the value and in each
/// parameter key and value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dsn {
    protocol: String,
    value: String,
    parameters: Vec<(String, Option<String>)>,
}

impl Dsn {
    /// Parse a DSN string.
    ///
    /// # Errors
    ///
    /// Returns [`DsnError::Invalid`] if the input is not a URI (including relative
    /// references, unescaped whitespace and escapes that do not decode to UTF-8),
    /// and [`DsnError::NotHierarchical`] for opaque URIs such as
    /// `mailto:someone`.
    pub fn parse(input: &str) -> Result<Self, DsnError> {
        // The URL parser would silently escape these
        if let Some(c) = input.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(DsnError::Invalid {
                input: input.to_string(),
                reason: format!("illegal character {c:?}, must be percent-encoded"),
            });
        }

        let url = Url::parse(input).map_err(|e| DsnError::Invalid {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(DsnError::NotHierarchical {
                input: input.to_string(),
            });
        }

        let parameters = url
            .query()
            .map(|query| parse_query(input, query))
            .transpose()?
            .unwrap_or_default();

        let mut value = authority(&url);
        value.push_str(url.path());
        let value = decode(input, &value)?;

        Ok(Self {
            protocol: url.scheme().to_string(),
            value,
            parameters,
        })
    }

    /// The URI scheme (e.g. `file`)
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Authority and path concatenated
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// All query parameters in the order they appeared
    #[must_use]
    pub fn parameters(&self) -> &[(String, Option<String>)] {
        &self.parameters
    }

    /// Whether the parameter appears at least once
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.parameters.iter().any(|(k, _)| k == key)
    }

    /// First occurrence of a parameter.
    ///
    /// Returns `None` when the key is absent, `Some(None)` when it is present
    /// without a value.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<Option<&str>> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    /// Every occurrence of a parameter, in order
    pub fn parameter_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = Option<&'a str>> {
        self.parameters
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }
}

/// Split a raw query on `&`, then on the first `=` of each pair.
///
/// Keys and values are decoded after splitting, so `%26` and `%3D` never act
/// as separators, then trimmed.
fn parse_query(input: &str, query: &str) -> Result<Vec<(String, Option<String>)>, DsnError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => Ok((decode_trimmed(input, k)?, Some(decode_trimmed(input, v)?))),
            None => Ok((decode_trimmed(input, pair)?, None)),
        })
        .collect()
}

fn decode_trimmed(input: &str, raw: &str) -> Result<String, DsnError> {
    decode(input, raw).map(|decoded| decoded.trim().to_string())
}

fn decode(input: &str, raw: &str) -> Result<String, DsnError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| DsnError::Invalid {
            input: input.to_string(),
            reason: format!("percent-escapes are not valid UTF-8: {e}"),
        })
}

/// Rebuild the `[user[:password]@]host[:port]` part of a URL.
fn authority(url: &Url) -> String {
    let mut authority = String::new();

    if !url.username().is_empty() {
        authority.push_str(url.username());
        if let Some(password) = url.password() {
            authority.push(':');
            authority.push_str(password);
        }
        authority.push('@');
    }

    if let Some(host) = url.host_str() {
        authority.push_str(host);
    }

    if let Some(port) = url.port() {
        authority.push(':');
        authority.push_str(&port.to_string());
    }

    authority
}

#[cfg(test)]
#[path = "dsn_tests.rs"]
mod dsn_tests;
