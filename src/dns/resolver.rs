// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Nameserver-backed [`Resolve`] implementation.
//!
//! Queries are sent with the synchronous `hickory-client` on the blocking
//! thread pool. A fair semaphore bounds how many queries are outstanding at
//! once (one by default), which keeps the load on the backing DNS servers
//! predictable: queries wait their turn in arrival order and are never
//! reordered or deduplicated.
//!
//! Nameservers are tried in configured order. The first one that answers wins,
//! whatever its response code; transport failures fall through to the next
//! nameserver. A truncated UDP answer is asked again over TCP from the same
//! nameserver.

use super::{DnsRequest, DnsResolution, Resolve};
use crate::errors::DnsError;
use crate::metrics::record_dns_query;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_client::client::{Client, ClientConnection, SyncClient};
use hickory_client::error::ClientResult;
use hickory_client::op::ResponseCode;
use hickory_client::rr::{DNSClass, Name, Record, RecordType};
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

/// Transport used to reach the nameservers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Plain UDP datagrams
    #[default]
    Udp,
    /// TCP connections (`force_tcp` option)
    Tcp,
}

/// Resolver querying a fixed list of nameservers.
pub struct DnsResolver {
    nameservers: Arc<[SocketAddr]>,
    transport: Transport,
    timeout: Duration,
    dispatch: Semaphore,
}

impl DnsResolver {
    /// Create a resolver.
    ///
    /// `max_in_flight` is the number of queries allowed on the wire at once and
    /// is raised to 1 if zero.
    #[must_use]
    pub fn new(
        nameservers: Vec<SocketAddr>,
        transport: Transport,
        timeout: Duration,
        max_in_flight: usize,
    ) -> Self {
        Self {
            nameservers: nameservers.into(),
            transport,
            timeout,
            dispatch: Semaphore::new(max_in_flight.max(1)),
        }
    }

    /// Configured nameservers, in query order
    #[must_use]
    pub fn nameservers(&self) -> &[SocketAddr] {
        &self.nameservers
    }

    async fn query(&self, request: &DnsRequest) -> Result<Vec<Record>, DnsError> {
        let qname = request.qname()?;
        let record_type = request.record_type().record_type();

        // The semaphore is never closed, so acquisition only fails on misuse
        let _permit = self.dispatch.acquire().await.map_err(|e| DnsError::Worker {
            reason: e.to_string(),
        })?;

        let nameservers = Arc::clone(&self.nameservers);
        let transport = self.transport;
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || {
            query_nameservers(&nameservers, transport, timeout, &qname, record_type)
        })
        .await
        .map_err(|e| DnsError::Worker {
            reason: e.to_string(),
        })?
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    async fn resolve(&self, request: &DnsRequest) -> DnsResolution {
        match self.query(request).await {
            Ok(answers) => {
                record_dns_query(&request.record_type().to_string(), true);
                let resolution = DnsResolution::from_answers(request.record_type(), answers);
                if let DnsResolution::Success(records) = &resolution {
                    debug!(request = %request, records = records.len(), "DNS query answered");
                }
                resolution
            }
            Err(e) => {
                record_dns_query(&request.record_type().to_string(), false);
                warn!(request = %request, error = %e, "DNS query failed");
                DnsResolution::Failure(e)
            }
        }
    }
}

/// Ask each nameserver in turn until one answers.
fn query_nameservers(
    nameservers: &[SocketAddr],
    transport: Transport,
    timeout: Duration,
    qname: &Name,
    record_type: RecordType,
) -> Result<Vec<Record>, DnsError> {
    let mut last_error = DnsError::NoNameservers;

    for &server in nameservers {
        trace!(server = %server, name = %qname, record_type = %record_type, "Sending DNS query");
        let attempt = query_server(server, transport, timeout, qname, record_type);

        match attempt {
            Ok(answer) if answer.code == ResponseCode::NoError => return Ok(answer.records),
            Ok(answer) => {
                return Err(DnsError::ResponseCode {
                    name: qname.to_string(),
                    server: server.to_string(),
                    code: answer.code,
                });
            }
            Err(e) => {
                debug!(server = %server, name = %qname, error = %e, "Nameserver unreachable, trying next");
                last_error = DnsError::Transport {
                    server: server.to_string(),
                    source: e,
                };
            }
        }
    }

    Err(last_error)
}

/// Response of a single nameserver
struct Answer {
    code: ResponseCode,
    truncated: bool,
    records: Vec<Record>,
}

/// Query one nameserver, switching to TCP when a UDP answer is truncated.
fn query_server(
    server: SocketAddr,
    transport: Transport,
    timeout: Duration,
    qname: &Name,
    record_type: RecordType,
) -> ClientResult<Answer> {
    let answer = match transport {
        Transport::Udp => UdpClientConnection::with_timeout(server, timeout)
            .and_then(|conn| query_once(conn, qname, record_type))?,
        Transport::Tcp => TcpClientConnection::with_timeout(server, timeout)
            .and_then(|conn| query_once(conn, qname, record_type))?,
    };

    if !retries_over_tcp(transport, &answer) {
        return Ok(answer);
    }

    debug!(
        server = %server,
        name = %qname,
        records = answer.records.len(),
        "Truncated UDP answer, retrying over TCP"
    );
    TcpClientConnection::with_timeout(server, timeout)
        .and_then(|conn| query_once(conn, qname, record_type))
}

/// Whether an answer is partial and must be asked again over TCP
fn retries_over_tcp(transport: Transport, answer: &Answer) -> bool {
    transport == Transport::Udp && answer.truncated
}

fn query_once<C: ClientConnection>(
    conn: C,
    qname: &Name,
    record_type: RecordType,
) -> ClientResult<Answer> {
    let client = SyncClient::new(conn);
    let response = client.query(qname, DNSClass::IN, record_type)?;
    Ok(Answer {
        code: response.response_code(),
        truncated: response.truncated(),
        records: response.answers().to_vec(),
    })
}

/// Nameservers of the system resolver configuration (`/etc/resolv.conf`).
///
/// Each nameserver is listed once even if configured for several protocols.
///
/// # Errors
///
/// Returns an error if the system configuration cannot be read or lists no
/// nameserver.
pub fn system_nameservers() -> Result<Vec<SocketAddr>> {
    let (config, _opts) = hickory_resolver::system_conf::read_system_conf()
        .context("Failed to read system resolver configuration")?;

    let mut nameservers: Vec<SocketAddr> = Vec::new();
    for server in config.name_servers() {
        if !nameservers.contains(&server.socket_addr) {
            nameservers.push(server.socket_addr);
        }
    }

    if nameservers.is_empty() {
        anyhow::bail!("System resolver configuration lists no nameserver");
    }
    Ok(nameservers)
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
