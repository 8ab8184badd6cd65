// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Content checksums used for change detection.
//!
//! Both the source watcher (template bytes) and the render scheduler (rendered
//! text) compare SHA-256 digests to decide whether anything actually changed,
//! avoiding redundant renders and redundant writes.

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 hash of some content.
///
/// # Returns
///
/// A lowercase hexadecimal string (64 characters).
///
/// # Example
///
/// ```rust
/// use poolwatch::checksum::sha256_hex;
///
/// let hash = sha256_hex(b"{\"pools\":{}}");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, sha256_hex(b"{\"pools\":{}}"));
/// ```
#[must_use]
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
