// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS resolution for server tokens.
//!
//! The render engine only depends on the [`Resolve`] trait. The production
//! implementation, [`DnsResolver`], queries the configured nameservers with
//! `hickory-client`; tests plug in an in-memory implementation.
//!
//! Every resolution yields records filtered to the requested type and sorted
//! by owner name, so two identical responses always render identically.

pub mod resolver;

pub use resolver::{system_nameservers, DnsResolver, Transport};

use crate::errors::DnsError;
use async_trait::async_trait;
use hickory_client::rr::{Name, Record, RecordType};
use std::fmt;
use tracing::{debug, warn};

/// Record types the render engine asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// IPv4 address records
    A,
    /// Service locator records
    Srv,
}

impl RequestType {
    /// The wire record type.
    #[must_use]
    pub fn record_type(self) -> RecordType {
        match self {
            Self::A => RecordType::A,
            Self::Srv => RecordType::SRV,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Srv => f.write_str("SRV"),
        }
    }
}

/// A single DNS question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsRequest {
    record_type: RequestType,
    name: String,
}

impl DnsRequest {
    /// Ask for the A records of `name`.
    #[must_use]
    pub fn a(name: impl Into<String>) -> Self {
        Self {
            record_type: RequestType::A,
            name: name.into(),
        }
    }

    /// Ask for the SRV records of `name`.
    #[must_use]
    pub fn srv(name: impl Into<String>) -> Self {
        Self {
            record_type: RequestType::Srv,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn record_type(&self) -> RequestType {
        self.record_type
    }

    /// The name as written in the template
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully-qualified query name.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidName`] if the name is not a valid DNS name.
    pub fn qname(&self) -> Result<Name, DnsError> {
        let mut name = Name::from_ascii(&self.name).map_err(|e| DnsError::InvalidName {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        name.set_fqdn(true);
        Ok(name)
    }
}

impl fmt::Display for DnsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.record_type, self.name)
    }
}

/// Outcome of a DNS question.
///
/// An empty `Success` means the name exists but has no record of the requested
/// type; only `Failure` aborts a render.
#[derive(Debug)]
pub enum DnsResolution {
    /// Records of the requested type, sorted by owner name
    Success(Vec<Record>),
    /// The query could not be answered
    Failure(DnsError),
}

impl DnsResolution {
    /// Build a success from raw answers, keeping only records of `record_type`.
    #[must_use]
    pub fn from_answers(record_type: RequestType, answers: Vec<Record>) -> Self {
        Self::Success(filter_and_sort(record_type, answers))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Resolves DNS questions on behalf of the render engine.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Answer `request`. Never panics on network errors; failures are reported
    /// as [`DnsResolution::Failure`] with their cause.
    async fn resolve(&self, request: &DnsRequest) -> DnsResolution;
}

/// Drop records of other types and order the rest by owner name.
///
/// The sort is stable, so records sharing an owner keep the server's order.
pub(crate) fn filter_and_sort(record_type: RequestType, answers: Vec<Record>) -> Vec<Record> {
    let wanted = record_type.record_type();
    let mut records: Vec<Record> = answers
        .into_iter()
        .filter(|record| {
            let keep = record.record_type() == wanted;
            if !keep {
                match record_type {
                    RequestType::A => warn!(
                        name = %record.name(),
                        found = %record.record_type(),
                        "Discarding unexpected record in A answer"
                    ),
                    RequestType::Srv => debug!(
                        name = %record.name(),
                        found = %record.record_type(),
                        "Discarding unexpected record in SRV answer"
                    ),
                }
            }
            keep
        })
        .collect();
    records.sort_by(|a, b| a.name().cmp(b.name()));
    records
}
