// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Poolwatch - DNS-backed server pool renderer
//!
//! Poolwatch is a sidecar that keeps the server pools of a JSON configuration
//! file (such as an mcrouter config) in sync with DNS.
//!
//! ## Overview
//!
//! A template declares pools whose `servers` entries are tokens:
//!
//! - `dnssrv://_memcache._tcp.cache.internal` - every target of an SRV record
//! - `dns://cache.internal` - every address of an A record, on the default port
//! - `dns+11311://cache.internal` - every address of an A record, on port 11311
//! - anything else - kept as is
//!
//! Each template is rendered into concrete `ip:port` lists and written to its
//! output whenever the template changes, then rendered again once the smallest
//! DNS TTL involved has expired. Outputs are only rewritten when the rendered
//! content actually changed.
//!
//! ## Modules
//!
//! - [`dsn`] - Parsing of `scheme://value?params` descriptor strings
//! - [`source`] - Template sources and their watchers
//! - [`output`] - Outputs and the crash-safe file writer
//! - [`dns`] - A/SRV resolution against the configured nameservers
//! - [`render`] - Pool tokenization and template rendering
//! - [`scheduler`] - Per-watch render scheduling
//! - [`registry`] - Lifecycle of active watches
//! - [`config`] - Settings file
//! - [`http`] - Info and health endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use poolwatch::dns::{DnsResolver, Transport};
//! use poolwatch::render::{RenderEngine, RenderSettings};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = DnsResolver::new(
//!     vec!["127.0.0.53:53".parse()?],
//!     Transport::Udp,
//!     Duration::from_secs(5),
//!     1,
//! );
//! let engine = RenderEngine::new(Arc::new(resolver), RenderSettings::default());
//!
//! let render = engine
//!     .render(r#"{"pools":{"main":{"servers":["dns://cache.internal"]}}}"#)
//!     .await?;
//! println!("{} (valid for {}s)", render.rendered(), render.ttl_seconds());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod config;
pub mod constants;
pub mod dns;
pub mod dsn;
pub mod duration;
pub mod errors;
pub mod http;
pub mod metrics;
pub mod output;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod source;
