// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process settings.
//!
//! Settings are read from an optional YAML file. Every field has a default, so
//! an empty file (or no file at all) yields a working configuration that
//! discovers nameservers from the system resolver configuration:
//!
//! ```yaml
//! dns:
//!   discovery: static
//!   nameservers: ["10.0.0.53:53", "10.0.1.53:53"]
//!   options: [force_tcp]
//!   timeout_seconds: 5
//!   max_in_flight: 1
//! render:
//!   default_port: 11211
//!   ttl: { min: 10, max: 86400 }
//! source:
//!   file: { check_period_seconds: 5 }
//! lifecycle:
//!   retry_delay_seconds: 10
//! server:
//!   listen_addr: "0.0.0.0:8080"
//! configs:
//!   - source: file:///etc/mcrouter/template.json
//!     output: file:///etc/mcrouter/config.json?mode=0640
//! ```

use crate::constants::{
    DEFAULT_DNS_MAX_IN_FLIGHT, DEFAULT_DNS_TIMEOUT_SECS, DEFAULT_FILE_CHECK_PERIOD_SECS,
    DEFAULT_LISTEN_ADDR, DEFAULT_RENDER_TTL_MAX_SECS, DEFAULT_RENDER_TTL_MIN_SECS,
    DEFAULT_RETRY_DELAY_SECS, DEFAULT_SERVER_PORT,
};
use crate::dns::{system_nameservers, Transport};
use crate::errors::{ConfigError, DescriptorError};
use crate::registry::WatchConfig;
use crate::render::RenderSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Root of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub dns: DnsSettings,
    pub render: RenderSection,
    pub source: SourceSettings,
    pub lifecycle: LifecycleSettings,
    pub server: ServerSettings,
    /// Watches to register at startup
    pub configs: Vec<ConfigEntry>,
}

/// How nameservers are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discovery {
    /// From the system resolver configuration
    #[default]
    Auto,
    /// From `dns.nameservers`
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsOption {
    /// Query nameservers over TCP instead of UDP
    ForceTcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DnsSettings {
    pub discovery: Discovery,
    /// `host:port` entries, used with static discovery
    pub nameservers: Vec<String>,
    pub options: Vec<DnsOption>,
    pub timeout_seconds: u64,
    /// Number of DNS queries allowed in flight at once
    pub max_in_flight: usize,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            discovery: Discovery::Auto,
            nameservers: Vec::new(),
            options: Vec::new(),
            timeout_seconds: DEFAULT_DNS_TIMEOUT_SECS,
            max_in_flight: DEFAULT_DNS_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    /// Port of `dns://host` tokens
    pub default_port: u32,
    pub ttl: TtlSettings,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            default_port: u32::from(DEFAULT_SERVER_PORT),
            ttl: TtlSettings::default(),
        }
    }
}

/// Bounds of the render TTL, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TtlSettings {
    pub min: u64,
    pub max: u64,
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            min: DEFAULT_RENDER_TTL_MIN_SECS,
            max: DEFAULT_RENDER_TTL_MAX_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub file: FileSourceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSourceSettings {
    /// Poll period of file sources without a `period` parameter
    pub check_period_seconds: u64,
}

impl Default for FileSourceSettings {
    fn default() -> Self {
        Self {
            check_period_seconds: DEFAULT_FILE_CHECK_PERIOD_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleSettings {
    /// Delay before retrying a failed render or write
    pub retry_delay_seconds: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Address of the info endpoint. `null` disables it.
    pub listen_addr: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: Some(DEFAULT_LISTEN_ADDR.to_string()),
        }
    }
}

/// A watch given as source and output DSNs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigEntry {
    pub source: String,
    pub output: String,
}

impl Settings {
    /// Read and validate the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML for the
    /// settings schema, or fails [`Settings::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading settings file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        // An empty document deserializes to null rather than an empty mapping
        let settings: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };

        settings.validate()?;
        info!(path = %path.display(), configs = settings.configs.len(), "Loaded settings file");
        Ok(settings)
    }

    /// Check constraints the schema alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dns = &self.dns;
        if dns.discovery == Discovery::Static && dns.nameservers.is_empty() {
            return Err(invalid(
                "dns.nameservers",
                "must not be empty with static discovery",
            ));
        }
        let mut seen = HashSet::new();
        for nameserver in &dns.nameservers {
            if !is_host_port(nameserver) {
                return Err(invalid(
                    "dns.nameservers",
                    format!("'{nameserver}' is not of the form host:port"),
                ));
            }
            if !seen.insert(nameserver) {
                return Err(invalid(
                    "dns.nameservers",
                    format!("'{nameserver}' is listed more than once"),
                ));
            }
        }
        if dns.options.iter().collect::<HashSet<_>>().len() != dns.options.len() {
            return Err(invalid("dns.options", "options must be unique"));
        }
        if dns.timeout_seconds == 0 {
            return Err(invalid("dns.timeout_seconds", "must be positive"));
        }
        if dns.max_in_flight == 0 {
            return Err(invalid("dns.max_in_flight", "must be positive"));
        }

        let render = &self.render;
        if render.default_port == 0 || render.default_port > u32::from(u16::MAX) {
            return Err(invalid(
                "render.default_port",
                format!("{} is not between 1 and 65535", render.default_port),
            ));
        }
        if render.ttl.min == 0 {
            return Err(invalid("render.ttl.min", "must be positive"));
        }
        if render.ttl.min > render.ttl.max {
            return Err(invalid(
                "render.ttl.max",
                format!(
                    "must be at least render.ttl.min ({} > {})",
                    render.ttl.min, render.ttl.max
                ),
            ));
        }

        if self.source.file.check_period_seconds == 0 {
            return Err(invalid(
                "source.file.check_period_seconds",
                "must be positive",
            ));
        }
        if self.lifecycle.retry_delay_seconds == 0 {
            return Err(invalid("lifecycle.retry_delay_seconds", "must be positive"));
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.configs.iter().enumerate() {
            for (name, value) in [("source", &entry.source), ("output", &entry.output)] {
                if !is_dsn_like(value) {
                    return Err(invalid(
                        format!("configs[{index}].{name}"),
                        format!("'{value}' is not of the form scheme://..."),
                    ));
                }
            }
            if !seen.insert(entry) {
                return Err(invalid(
                    format!("configs[{index}]"),
                    "duplicates an earlier entry",
                ));
            }
        }

        Ok(())
    }

    /// Nameservers to query, in order.
    ///
    /// With static discovery, hostnames are resolved once through the system
    /// resolver and the first address of each is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or a static nameserver cannot be
    /// resolved.
    pub fn nameservers(&self) -> Result<Vec<SocketAddr>> {
        match self.dns.discovery {
            Discovery::Auto => system_nameservers(),
            Discovery::Static => {
                let mut nameservers = Vec::with_capacity(self.dns.nameservers.len());
                for nameserver in &self.dns.nameservers {
                    let addr = nameserver
                        .to_socket_addrs()
                        .with_context(|| format!("Failed to resolve nameserver {nameserver}"))?
                        .next()
                        .with_context(|| format!("Nameserver {nameserver} has no address"))?;
                    if !nameservers.contains(&addr) {
                        nameservers.push(addr);
                    }
                }
                Ok(nameservers)
            }
        }
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        if self.dns.options.contains(&DnsOption::ForceTcp) {
            Transport::Tcp
        } else {
            Transport::Udp
        }
    }

    #[must_use]
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns.timeout_seconds)
    }

    /// Render engine settings. Only meaningful once validated.
    #[must_use]
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            default_port: u16::try_from(self.render.default_port).unwrap_or(DEFAULT_SERVER_PORT),
            ttl_min: self.render.ttl.min,
            ttl_max: self.render.ttl.max,
        }
    }

    #[must_use]
    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.source.file.check_period_seconds)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.lifecycle.retry_delay_seconds)
    }

    /// Parse the `configs` entries into watches.
    ///
    /// # Errors
    ///
    /// Returns the first DSN that fails to parse.
    pub fn watch_configs(&self) -> Result<Vec<WatchConfig>, DescriptorError> {
        self.configs
            .iter()
            .map(|entry| WatchConfig::parse(&entry.source, &entry.output, self.check_period()))
            .collect()
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

/// `^.+:\d+$`
fn is_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// `^[a-z]+://.+`
fn is_dsn_like(value: &str) -> bool {
    match value.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty() && scheme.bytes().all(|b| b.is_ascii_lowercase()) && !rest.is_empty()
        }
        None => false,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
