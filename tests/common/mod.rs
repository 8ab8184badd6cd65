// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hickory_client::op::ResponseCode;
use hickory_client::rr::rdata::{A, SRV};
use hickory_client::rr::{Name, RData, Record};
use poolwatch::dns::{DnsRequest, DnsResolution, Resolve};
use poolwatch::errors::DnsError;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How long to wait for an expected output before failing
pub const WAIT: Duration = Duration::from_secs(10);

/// In-memory DNS whose answers can change while a watch is running.
#[derive(Default)]
pub struct MemoryDns {
    answers: Mutex<HashMap<String, Result<Vec<Record>, ResponseCode>>>,
    queries: Mutex<Vec<String>>,
}

impl MemoryDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve A records for `name`, all with `ttl`.
    pub fn set_a(&self, name: &str, ips: &[Ipv4Addr], ttl: u32) {
        let records = ips
            .iter()
            .map(|ip| Record::from_rdata(fqdn(name), ttl, RData::A(A::from(*ip))))
            .collect();
        self.answers
            .lock()
            .unwrap()
            .insert(format!("A {name}"), Ok(records));
    }

    /// Serve SRV records for `name`; `targets` are `(priority, target, port)`.
    pub fn set_srv(&self, name: &str, targets: &[(u16, &str, u16)], ttl: u32) {
        let records = targets
            .iter()
            .map(|(priority, target, port)| {
                Record::from_rdata(
                    fqdn(name),
                    ttl,
                    RData::SRV(SRV::new(*priority, 10, *port, fqdn(target))),
                )
            })
            .collect();
        self.answers
            .lock()
            .unwrap()
            .insert(format!("SRV {name}"), Ok(records));
    }

    /// Answer queries of `request` (e.g. `A host`) with SERVFAIL.
    pub fn fail(&self, request: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(request.to_string(), Err(ResponseCode::ServFail));
    }

    /// Every query received so far, as `TYPE name`
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resolve for MemoryDns {
    async fn resolve(&self, request: &DnsRequest) -> DnsResolution {
        let key = request.to_string();
        self.queries.lock().unwrap().push(key.clone());

        match self.answers.lock().unwrap().get(&key).cloned() {
            Some(Ok(records)) => DnsResolution::from_answers(request.record_type(), records),
            Some(Err(code)) => DnsResolution::Failure(DnsError::ResponseCode {
                name: request.name().to_string(),
                server: "127.0.0.1:53".to_string(),
                code,
            }),
            None => DnsResolution::Success(Vec::new()),
        }
    }
}

pub fn fqdn(name: &str) -> Name {
    let mut name = Name::from_str(name).unwrap();
    name.set_fqdn(true);
    name
}

/// Wait until `path` exists and its content satisfies `check`, returning it.
pub async fn wait_for_output(path: &Path, check: impl Fn(&str) -> bool) -> String {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Ok(content) = std::fs::read_to_string(path) {
            if check(&content) {
                return content;
            }
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for expected content in {}",
            path.display()
        );
        sleep(Duration::from_millis(25)).await;
    }
}

/// Servers of `pool` in a rendered document.
pub fn servers(rendered: &str, pool: &str) -> Vec<String> {
    let document: serde_json::Value = serde_json::from_str(rendered).unwrap();
    document["pools"][pool]["servers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|server| server.as_str().unwrap().to_string())
        .collect()
}
