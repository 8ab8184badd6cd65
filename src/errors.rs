// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for poolwatch.
//!
//! This module provides specialized error types for:
//! - DSN and source/output descriptor parsing
//! - Template validation and pool tokenization
//! - DNS resolution through the configured nameservers
//! - Rendering and writing output files
//! - Watch registration and settings validation
//!
//! Per-watch failures (template, resolution, output) are retried by the render
//! scheduler; descriptor and registration failures are fatal to the registration
//! they belong to only.

use crate::dns::RequestType;
use hickory_client::op::ResponseCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing a `scheme://value?params` DSN string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DsnError {
    /// The input could not be parsed as a URI at all
    #[error("Invalid DSN string '{input}': {reason}")]
    Invalid {
        /// The raw DSN string
        input: String,
        /// Parser failure
        reason: String,
    },

    /// The input parsed but is relative or opaque (e.g. `mailto:x`)
    #[error("DSN string must be an absolute and non-opaque URI: '{input}'")]
    NotHierarchical {
        /// The raw DSN string
        input: String,
    },
}

/// Errors raised while turning a DSN into a source or output descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The DSN itself is malformed
    #[error(transparent)]
    Dsn(#[from] DsnError),

    /// No watcher or writer implements the requested scheme
    #[error("Unsupported {kind} type: {scheme}")]
    UnsupportedType {
        /// `source` or `output`
        kind: &'static str,
        /// The DSN scheme
        scheme: String,
    },

    /// File descriptors require an absolute path
    #[error("Path must be absolute: {path}")]
    RelativePath {
        /// The offending path
        path: String,
    },

    /// A DSN query parameter has an invalid value
    #[error("Invalid '{name}' parameter in '{input}': {reason}")]
    InvalidParameter {
        /// The raw DSN string
        input: String,
        /// Parameter name
        name: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors raised by structurally invalid templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The template is not valid JSON
    #[error("Cannot parse configuration template: {0}")]
    Parse(#[from] serde_json::Error),

    /// `$.pools` is missing, not an object, or empty
    #[error("Cannot parse configuration template, $.pools must be non-empty object")]
    InvalidPools,

    /// A pool failed tokenization; `message` lists every violation
    #[error("pool[{pool}]: {message}")]
    PoolTokenization {
        /// The pool name
        pool: String,
        /// One structural problem, or the aggregated per-server problems
        message: String,
    },
}

/// Errors raised by DNS queries.
#[derive(Error, Debug)]
pub enum DnsError {
    /// The query name is not a valid DNS name
    #[error("Invalid DNS name '{name}': {reason}")]
    InvalidName {
        /// The query name
        name: String,
        /// Parser failure
        reason: String,
    },

    /// Connection, timeout or protocol failure talking to a nameserver
    #[error("DNS query to {server} failed: {source}")]
    Transport {
        /// The nameserver (IP:port)
        server: String,
        /// Underlying client error
        #[source]
        source: hickory_client::error::ClientError,
    },

    /// The nameserver answered with a non-NOERROR response code (NXDOMAIN, SERVFAIL...)
    #[error("DNS server {server} answered {code:?} for '{name}'")]
    ResponseCode {
        /// The query name
        name: String,
        /// The nameserver (IP:port)
        server: String,
        /// The response code
        code: ResponseCode,
    },

    /// No nameserver is configured
    #[error("No DNS nameservers configured")]
    NoNameservers,

    /// The resolution worker failed before producing an answer
    #[error("DNS resolution worker failed: {reason}")]
    Worker {
        /// Explanation of the failure
        reason: String,
    },
}

/// Errors that abort a render cycle.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The template is structurally invalid
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A DNS query failed (as opposed to returning no records)
    #[error("Cannot resolve {record_type} {name}")]
    Resolution {
        /// The query type
        record_type: RequestType,
        /// The query name
        name: String,
        /// Underlying resolver failure
        #[source]
        source: DnsError,
    },

    /// The rewritten document could not be serialized
    #[error("Cannot serialize rendered template: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors raised while persisting rendered output.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Neither the output path nor its parent directory exists
    #[error("Output path or its parent folder must exist but did not: {}", path.display())]
    PathUnavailable {
        /// The output path
        path: PathBuf,
    },

    /// A filesystem operation failed
    #[error("Failed to {op} {}: {source}", path.display())]
    Io {
        /// Short description of the operation (e.g. "write", "rename")
        op: &'static str,
        /// The path being operated on
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised when registering a watch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// `start()` has not been called, or `stop()` already has
    #[error("Watch registry is not running, ignoring registration of {config}")]
    NotRunning {
        /// The rejected watch configuration
        config: String,
    },

    /// The exact same configuration is already registered
    #[error("Watch already registered: {config}")]
    AlreadyRegistered {
        /// The rejected watch configuration
        config: String,
    },

    /// Another registration already watches this source
    #[error("Source {location} is already watched by another registration")]
    SourceAlreadyWatched {
        /// The watched source location
        location: String,
    },
}

/// Errors raised while loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        /// The settings file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid YAML for the settings schema
    #[error("Failed to parse settings file {}: {source}", path.display())]
    Parse {
        /// The settings file path
        path: PathBuf,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting has an invalid value
    #[error("Invalid setting '{field}': {reason}")]
    Invalid {
        /// Dotted setting path (e.g. `render.ttl.min`)
        field: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
