// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for poolwatch.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DSN Constants
// ============================================================================

/// Scheme for filesystem sources and outputs
pub const FILE_SCHEME: &str = "file";

/// Source DSN parameter overriding the poll period (e.g. `?period=42s`)
pub const SOURCE_PARAM_PERIOD: &str = "period";

/// Output DSN parameter setting the owner uid
pub const OUTPUT_PARAM_UID: &str = "uid";

/// Output DSN parameter setting the owner gid
pub const OUTPUT_PARAM_GID: &str = "gid";

/// Output DSN parameter setting the octal file mode
pub const OUTPUT_PARAM_MODE: &str = "mode";

/// Default mode applied to rendered output files
pub const DEFAULT_OUTPUT_MODE: u32 = 0o644;

/// Lowest accepted output mode (owner must keep read/write)
pub const MIN_OUTPUT_MODE: u32 = 0o600;

/// Highest accepted output mode
pub const MAX_OUTPUT_MODE: u32 = 0o777;

// ============================================================================
// Template Constants
// ============================================================================

/// Top-level template field holding the pools
pub const TEMPLATE_POOLS_FIELD: &str = "pools";

/// Per-pool field holding the server tokens
pub const TEMPLATE_SERVERS_FIELD: &str = "servers";

/// Token prefix for SRV-based servers
pub const TOKEN_DNSSRV_PREFIX: &str = "dnssrv://";

/// Token prefix for A-based servers using the default port
pub const TOKEN_DNSA_PREFIX: &str = "dns://";

/// Token prefix for A-based servers with an explicit port (`dns+<port>://<host>`)
pub const TOKEN_DNSA_PORT_PREFIX: &str = "dns+";

/// Separator between the port and host in `dns+<port>://<host>` tokens
pub const TOKEN_DNSA_PORT_SEPARATOR: &str = "://";

/// TTL of servers that are not DNS-backed
pub const UNBOUNDED_TTL_SECS: u64 = u64::MAX;

// ============================================================================
// Default Settings
// ============================================================================

/// Default port for `dns://host` tokens (memcached)
pub const DEFAULT_SERVER_PORT: u16 = 11211;

/// Default lower bound of the render TTL (10 seconds)
pub const DEFAULT_RENDER_TTL_MIN_SECS: u64 = 10;

/// Default upper bound of the render TTL (1 day)
pub const DEFAULT_RENDER_TTL_MAX_SECS: u64 = 86_400;

/// Default delay before retrying a failed render (10 seconds)
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Default poll period for file sources (5 seconds)
pub const DEFAULT_FILE_CHECK_PERIOD_SECS: u64 = 5;

/// Default DNS query timeout (5 seconds)
pub const DEFAULT_DNS_TIMEOUT_SECS: u64 = 5;

/// Default number of DNS queries allowed in flight at once
pub const DEFAULT_DNS_MAX_IN_FLIGHT: usize = 1;

/// Default listen address of the info endpoint
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Output Writer Constants
// ============================================================================

/// Prefix of temporary files created in the system temp directory
pub const TMPFILE_PREFIX: &str = "poolwatch-tmpfile-";

/// Suffix of temporary files created in the system temp directory
pub const TMPFILE_SUFFIX: &str = ".tmp";

/// Infix of sibling temporary files (`<name>.new-<epoch>-<random>`)
pub const SIBLING_TMPFILE_INFIX: &str = ".new-";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Crate version reported by `--version`, `/` and `/info`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
