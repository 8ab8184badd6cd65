// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pool tokenizer.
//!
//! Turns the `servers` array of one pool into [`ServerToken`]s. Entries are
//! matched against these forms, first match wins:
//!
//! | Entry                | Token                           |
//! |----------------------|---------------------------------|
//! | `dnssrv://<service>` | [`ServerToken::DnsSrv`]         |
//! | `dns://<host>`       | [`ServerToken::DnsA`], default port |
//! | `dns+<port>://<host>`| [`ServerToken::DnsA`], given port |
//! | anything else        | [`ServerToken::Fixed`]          |
//!
//! Every entry is checked before failing, and all problems are reported in a
//! single error.

use crate::constants::{
    TEMPLATE_SERVERS_FIELD, TOKEN_DNSA_PORT_PREFIX, TOKEN_DNSA_PORT_SEPARATOR, TOKEN_DNSA_PREFIX,
    TOKEN_DNSSRV_PREFIX,
};
use crate::errors::TemplateError;
use serde_json::Value;
use std::fmt;
use tracing::{trace, warn};

/// One parsed `servers[]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerToken {
    /// Passed through verbatim
    Fixed {
        /// The entry as written
        literal: String,
    },
    /// Resolved through the A records of `hostname`
    DnsA {
        /// Name to query
        hostname: String,
        /// Port appended to every resolved address
        port: u16,
    },
    /// Resolved through the SRV records of `service`, then the A records of
    /// each target
    DnsSrv {
        /// SRV name to query (e.g. `_memcache._tcp.example.com`)
        service: String,
    },
}

impl fmt::Display for ServerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed { literal } => write!(f, "Fixed({literal})"),
            Self::DnsA { hostname, port } => write!(f, "DnsA({hostname}:{port})"),
            Self::DnsSrv { service } => write!(f, "DnsSrv({service})"),
        }
    }
}

/// Tokenizes pools of a template.
#[derive(Debug, Clone, Copy)]
pub struct PoolTokenizer {
    default_port: u16,
}

impl PoolTokenizer {
    /// Create a tokenizer giving `dns://host` tokens `default_port`.
    #[must_use]
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }

    /// Tokenize the pool `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::PoolTokenization`] if the pool is not an object
    /// with a `servers` array, or if any entry is not a valid server token. In
    /// the latter case the message lists every invalid entry.
    pub fn tokenize(&self, name: &str, pool: &Value) -> Result<Vec<ServerToken>, TemplateError> {
        trace!(pool = %name, "Tokenizing pool");
        let fail = |message: String| TemplateError::PoolTokenization {
            pool: name.to_string(),
            message,
        };

        let fields = match pool {
            Value::Null => return Err(fail("is null".to_string())),
            Value::Object(fields) => fields,
            other => {
                return Err(fail(format!(
                    "is not a json object (was: {})",
                    json_type(other)
                )))
            }
        };

        let servers = match fields.get(TEMPLATE_SERVERS_FIELD) {
            None => return Err(fail(format!("has no '{TEMPLATE_SERVERS_FIELD}' field"))),
            Some(Value::Null) => return Err(fail("$.servers is null".to_string())),
            Some(Value::Array(servers)) => servers,
            Some(other) => {
                return Err(fail(format!(
                    "$.servers is not a json array (was: {})",
                    json_type(other)
                )))
            }
        };

        let mut failures = Vec::new();
        let mut tokens = Vec::with_capacity(servers.len());

        for (i, entry) in servers.iter().enumerate() {
            let text = match entry {
                Value::Null => {
                    failures.push(format!("- servers[{i}] is null"));
                    continue;
                }
                Value::String(text) => text,
                other => {
                    failures.push(format!(
                        "- servers[{i}] is not a string (was: {})",
                        json_type(other)
                    ));
                    continue;
                }
            };

            if text.trim().is_empty() {
                failures.push(format!("- servers[{i}] is a blank string"));
                continue;
            }

            match self.parse_server(text) {
                Some(token) => {
                    trace!(pool = %name, index = i, entry = %text, token = %token, "Parsed server");
                    tokens.push(token);
                }
                None => failures.push(format!(
                    "- servers[{i}] is not a valid server token (from: '{text}')"
                )),
            }
        }

        if failures.is_empty() {
            Ok(tokens)
        } else {
            Err(fail(format!(
                "Some servers in $.servers were not successfully parsed:\n{}",
                failures.join("\n")
            )))
        }
    }

    /// Classify one entry. `None` means it looks like a `dns+<port>://` token
    /// but its port is not valid.
    fn parse_server(&self, server: &str) -> Option<ServerToken> {
        if let Some(service) = server.strip_prefix(TOKEN_DNSSRV_PREFIX) {
            return Some(ServerToken::DnsSrv {
                service: service.to_string(),
            });
        }
        if let Some(hostname) = server.strip_prefix(TOKEN_DNSA_PREFIX) {
            return Some(ServerToken::DnsA {
                hostname: hostname.to_string(),
                port: self.default_port,
            });
        }

        if let Some((port, hostname)) = server
            .strip_prefix(TOKEN_DNSA_PORT_PREFIX)
            .and_then(split_port_and_host)
        {
            return match port.parse::<i64>().map(u16::try_from) {
                Ok(Ok(port)) => Some(ServerToken::DnsA {
                    hostname: hostname.to_string(),
                    port,
                }),
                Ok(Err(_)) => {
                    warn!(port = %port, server = %server, "Invalid unix port number");
                    None
                }
                Err(e) => {
                    warn!(port = %port, server = %server, error = %e, "Invalid server port specification");
                    None
                }
            };
        }

        Some(ServerToken::Fixed {
            literal: server.to_string(),
        })
    }
}

/// Split `<port>://<host>` on the last separator that leaves a non-empty host.
///
/// The port may come out empty, which then fails to parse.
fn split_port_and_host(rest: &str) -> Option<(&str, &str)> {
    rest.rmatch_indices(TOKEN_DNSA_PORT_SEPARATOR)
        .map(|(at, sep)| (&rest[..at], &rest[at + sep.len()..]))
        .find(|(_, host)| !host.is_empty())
}

/// JSON node type name, as shown in tokenization errors.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(_) => "NUMBER",
        Value::String(_) => "STRING",
        Value::Array(_) => "ARRAY",
        Value::Object(_) => "OBJECT",
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod token_tests;
