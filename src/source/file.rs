// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Polling watcher for file sources.
//!
//! Each watched file gets its own poll loop running as an independent tokio task:
//!
//! 1. Read the whole file
//! 2. Skip the cycle if it is empty (truncated or being replaced)
//! 3. Hash the content and compare with the last seen hash
//! 4. If it changed, remember the hash and hand the content to the callback
//! 5. Sleep for the source's poll period
//!
//! I/O errors are logged and retried on the next cycle, so a file that does not
//! exist yet is picked up as soon as it appears.

use super::FileSource;
use crate::checksum::sha256_hex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Callback receiving the new template content after every change.
pub type ChangeCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Watches file sources by polling them.
#[derive(Default)]
pub struct FileWatcher {
    /// Shutdown signal of each running poll loop
    watches: Mutex<HashMap<FileSource, watch::Sender<bool>>>,
}

impl FileWatcher {
    /// Create a watcher with no active watches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling `source`, invoking `on_changed` with each new content.
    ///
    /// Must be called from within a tokio runtime. A source that does not exist
    /// yet is accepted with a warning.
    ///
    /// # Returns
    ///
    /// `true` if a new poll loop was started, `false` if the source was already
    /// watched (the existing loop is left untouched).
    pub fn add_watch(&self, source: FileSource, on_changed: ChangeCallback) -> bool {
        let mut watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);

        match std::fs::metadata(source.path()) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => warn!(source = %source, "Source path is not a regular file"),
            Err(e) => warn!(source = %source, error = %e, "Source path not found or not readable"),
        }

        if watches.contains_key(&source) {
            warn!(source = %source, "File watch already exists");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        watches.insert(source.clone(), shutdown_tx);
        debug!(source = %source, period = ?source.period(), "Registered file watch");

        tokio::spawn(poll(source, on_changed, shutdown_rx));
        true
    }

    /// Stop polling `source`. The loop exits after its current cycle.
    ///
    /// # Returns
    ///
    /// `false` if the source was not watched.
    pub fn remove_watch(&self, source: &FileSource) -> bool {
        let removed = self
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source);

        match removed {
            Some(shutdown) => {
                // The loop may already be gone if its task panicked
                let _ = shutdown.send(true);
                debug!(source = %source, "Shutting down file watch");
                true
            }
            None => {
                debug!(source = %source, "No existing file watch");
                false
            }
        }
    }

    /// Snapshot of the currently watched sources.
    #[must_use]
    pub fn sources(&self) -> Vec<FileSource> {
        let mut sources: Vec<FileSource> = self
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        sources.sort();
        sources
    }
}

/// Poll loop of a single source.
async fn poll(source: FileSource, on_changed: ChangeCallback, mut shutdown: watch::Receiver<bool>) {
    debug!(source = %source, "Started file watch");
    let mut last_checksum: Option<String> = None;

    while !*shutdown.borrow() {
        match tokio::fs::read(source.path()).await {
            Ok(bytes) if bytes.is_empty() => {
                trace!(source = %source, "Template file is empty, skipping cycle");
            }
            Ok(bytes) => {
                let checksum = sha256_hex(&bytes);
                if last_checksum.as_deref() == Some(checksum.as_str()) {
                    trace!(source = %source, checksum = %checksum, "Template file unchanged");
                } else {
                    // Undecodable content is remembered too
                    let previous = last_checksum.replace(checksum.clone());
                    match String::from_utf8(bytes) {
                        Ok(content) => {
                            info!(
                                source = %source,
                                previous = previous.as_deref().unwrap_or("none"),
                                current = %checksum,
                                "Template file changed"
                            );
                            on_changed(content);
                        }
                        Err(e) => {
                            error!(source = %source, checksum = %checksum, error = %e, "Template file is not valid UTF-8");
                        }
                    }
                }
            }
            Err(e) => {
                error!(source = %source, error = %e, "Unable to read template file");
            }
        }

        tokio::select! {
            () = tokio::time::sleep(source.period()) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(source = %source, "Stopped file watch");
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod file_tests;
