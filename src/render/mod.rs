// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Template rendering.
//!
//! A template is a JSON document with a non-empty `pools` object. Each pool's
//! `servers` array is tokenized, every token is resolved to concrete
//! `ip:port` strings, and the array is replaced in place. Everything else in
//! the document (unrelated fields, key order) is kept as is.
//!
//! # TTL
//!
//! Every resolved server carries the TTL of the records it came from. Servers
//! reached through SRV then A records take the smaller of the two TTLs, so a
//! change at either hop triggers a re-render. Fixed servers never expire.
//!
//! The render TTL is the smallest server TTL of the whole document, clamped
//! to the configured `[min, max]` range. A document without any DNS-backed
//! server uses the configured maximum.
//!
//! # Example
//!
//! ```rust,no_run
//! use poolwatch::dns::{DnsResolver, Transport};
//! use poolwatch::render::{RenderEngine, RenderSettings};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = DnsResolver::new(
//!     vec!["127.0.0.1:53".parse()?],
//!     Transport::Udp,
//!     Duration::from_secs(5),
//!     1,
//! );
//! let engine = RenderEngine::new(Arc::new(resolver), RenderSettings::default());
//!
//! let render = engine
//!     .render(r#"{"pools":{"cache":{"servers":["dns://memcached.example"]}}}"#)
//!     .await?;
//! println!("{} (refresh in {}s)", render.rendered(), render.ttl_seconds());
//! # Ok(())
//! # }
//! ```

pub mod token;

pub use token::{PoolTokenizer, ServerToken};

use crate::checksum::sha256_hex;
use crate::constants::{
    DEFAULT_RENDER_TTL_MAX_SECS, DEFAULT_RENDER_TTL_MIN_SECS, DEFAULT_SERVER_PORT,
    TEMPLATE_POOLS_FIELD, TEMPLATE_SERVERS_FIELD, UNBOUNDED_TTL_SECS,
};
use crate::dns::{DnsRequest, DnsResolution, Resolve};
use crate::errors::{RenderError, TemplateError};
use hickory_client::rr::rdata::SRV;
use hickory_client::rr::{RData, Record};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Render {
    rendered: String,
    ttl_seconds: u64,
    checksum: String,
}

impl Render {
    /// Wrap rendered text, computing its checksum.
    #[must_use]
    pub fn new(rendered: String, ttl_seconds: u64) -> Self {
        let checksum = sha256_hex(rendered.as_bytes());
        Self {
            rendered,
            ttl_seconds,
            checksum,
        }
    }

    /// The rendered document
    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Seconds until the document should be rendered again
    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// SHA-256 hex digest of the rendered document
    #[must_use]
    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

/// One concrete endpoint produced by a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedServer {
    /// `ip:port`, or the literal of a fixed token
    pub value: String,
    /// Token the endpoint was resolved from
    pub origin: ServerToken,
    /// Seconds this endpoint stays valid
    pub ttl_seconds: u64,
}

/// Render engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Port of `dns://host` tokens
    pub default_port: u16,
    /// Lower bound of the render TTL in seconds
    pub ttl_min: u64,
    /// Upper bound of the render TTL in seconds
    pub ttl_max: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_SERVER_PORT,
            ttl_min: DEFAULT_RENDER_TTL_MIN_SECS,
            ttl_max: DEFAULT_RENDER_TTL_MAX_SECS,
        }
    }
}

impl RenderSettings {
    /// Clamp the smallest DNS TTL of a document to `[ttl_min, ttl_max]`.
    #[must_use]
    pub fn clamp_ttl(&self, dns_ttl: u64) -> u64 {
        self.ttl_min.max(dns_ttl.min(self.ttl_max))
    }
}

/// Renders templates by resolving their server tokens.
pub struct RenderEngine {
    resolver: Arc<dyn Resolve>,
    tokenizer: PoolTokenizer,
    settings: RenderSettings,
}

impl RenderEngine {
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolve>, settings: RenderSettings) -> Self {
        Self {
            resolver,
            tokenizer: PoolTokenizer::new(settings.default_port),
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `template`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not JSON, has no non-empty `pools`
    /// object, contains an invalid pool, or if a DNS query fails. A query that
    /// succeeds without records is not an error: its token renders to nothing.
    pub async fn render(&self, template: &str) -> Result<Render, RenderError> {
        trace!(template = %template, "Rendering template");

        let mut root: Value = serde_json::from_str(template).map_err(TemplateError::Parse)?;

        let pools = match root.get_mut(TEMPLATE_POOLS_FIELD) {
            Some(Value::Object(pools)) if !pools.is_empty() => pools,
            _ => return Err(TemplateError::InvalidPools.into()),
        };

        let mut min_dns_ttl = UNBOUNDED_TTL_SECS;

        for (name, pool) in pools.iter_mut() {
            trace!(pool = %name, "Processing pool");
            let tokens = self.tokenizer.tokenize(name, pool)?;

            let mut servers = Vec::new();
            for token in &tokens {
                servers.extend(self.resolve_token(token).await?);
            }

            let pool_ttl = servers
                .iter()
                .map(|server| server.ttl_seconds)
                .min()
                .unwrap_or(UNBOUNDED_TTL_SECS);
            min_dns_ttl = min_dns_ttl.min(pool_ttl);

            let values: Vec<Value> = servers
                .into_iter()
                .map(|server| Value::String(server.value))
                .collect();
            debug!(pool = %name, servers = ?values, ttl = pool_ttl, "Resolved pool servers");

            if let Some(slot) = pool.get_mut(TEMPLATE_SERVERS_FIELD) {
                *slot = Value::Array(values);
            }
        }

        let ttl = self.settings.clamp_ttl(min_dns_ttl);
        let rendered = serde_json::to_string(&root).map_err(RenderError::Serialize)?;
        debug!(ttl = ttl, rendered = %rendered, "Rendered template");

        Ok(Render::new(rendered, ttl))
    }

    async fn resolve_token(&self, token: &ServerToken) -> Result<Vec<ResolvedServer>, RenderError> {
        trace!(token = %token, "Resolving token");
        match token {
            ServerToken::Fixed { literal } => Ok(vec![ResolvedServer {
                value: literal.clone(),
                origin: token.clone(),
                ttl_seconds: UNBOUNDED_TTL_SECS,
            }]),
            ServerToken::DnsA { hostname, port } => {
                self.resolve_a(hostname, *port, token, UNBOUNDED_TTL_SECS)
                    .await
            }
            ServerToken::DnsSrv { service } => self.resolve_srv(service, token).await,
        }
    }

    async fn resolve_srv(
        &self,
        service: &str,
        origin: &ServerToken,
    ) -> Result<Vec<ResolvedServer>, RenderError> {
        let records = self.query(DnsRequest::srv(service)).await?;

        let srv_ttl = match records.iter().map(Record::ttl).min() {
            Some(ttl) => u64::from(ttl),
            None => return Ok(Vec::new()),
        };

        let mut targets: Vec<&SRV> = records
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::SRV(srv)) => Some(srv),
                _ => None,
            })
            .collect();
        targets.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.target().cmp(b.target()))
        });

        let mut servers = Vec::new();
        for srv in targets {
            let target = srv.target().to_string();
            let target = target.trim_end_matches('.');
            servers.extend(self.resolve_a(target, srv.port(), origin, srv_ttl).await?);
        }
        Ok(servers)
    }

    /// Resolve `hostname` to `ip:port` servers whose TTL is at most `max_ttl`.
    async fn resolve_a(
        &self,
        hostname: &str,
        port: u16,
        origin: &ServerToken,
        max_ttl: u64,
    ) -> Result<Vec<ResolvedServer>, RenderError> {
        let records = self.query(DnsRequest::a(hostname)).await?;

        let records_ttl = match records.iter().map(Record::ttl).min() {
            Some(ttl) => u64::from(ttl),
            None => return Ok(Vec::new()),
        };
        let ttl = records_ttl.min(max_ttl);

        Ok(records
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::A(a)) => Some(ResolvedServer {
                    value: format!("{}:{port}", a.0),
                    origin: origin.clone(),
                    ttl_seconds: ttl,
                }),
                _ => None,
            })
            .collect())
    }

    async fn query(&self, request: DnsRequest) -> Result<Vec<Record>, RenderError> {
        match self.resolver.resolve(&request).await {
            DnsResolution::Success(records) => Ok(records),
            DnsResolution::Failure(source) => Err(RenderError::Resolution {
                record_type: request.record_type(),
                name: request.name().to_string(),
                source,
            }),
        }
    }
}
