// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Crash-safe writer for file outputs.
//!
//! Content is first written to a temporary file, which then replaces the target
//! (see [`WriteMethod`]). Readers of the target never observe a partially
//! written file, except with the [`WriteMethod::TmpdirCopy`] fallback.
//! Ownership and mode are applied to the final file after the move.

use super::{FileOutput, ModeConverter, WriteMethod};
use crate::constants::{SIBLING_TMPFILE_INFIX, TMPFILE_PREFIX, TMPFILE_SUFFIX};
use crate::errors::OutputError;
use crate::metrics::record_write;
use std::collections::HashMap;
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Writes rendered content to file outputs.
///
/// The write method of each target is determined on its first write and
/// cached for the lifetime of the writer, since the backing filesystem of a
/// path does not change at runtime.
#[derive(Debug)]
pub struct FileWriter {
    tmpdir: PathBuf,
    methods: Mutex<HashMap<PathBuf, WriteMethod>>,
    modes: ModeConverter,
}

impl Default for FileWriter {
    fn default() -> Self {
        Self::with_tmpdir(std::env::temp_dir())
    }
}

impl FileWriter {
    /// Create a writer using the system temp directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer staging temporary files in `tmpdir`.
    #[must_use]
    pub fn with_tmpdir(tmpdir: impl Into<PathBuf>) -> Self {
        Self {
            tmpdir: tmpdir.into(),
            methods: Mutex::new(HashMap::new()),
            modes: ModeConverter::new(),
        }
    }

    /// Replace the content of `output` with `content`.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::PathUnavailable`] if neither the output path nor
    /// its parent directory exists, and [`OutputError::Io`] if writing, moving,
    /// or applying attributes fails. The temporary file is removed when the
    /// move fails.
    pub async fn flush(&self, output: &FileOutput, content: &str) -> Result<(), OutputError> {
        let result = self.write(output, content).await;
        record_write(result.is_ok());
        result
    }

    async fn write(&self, output: &FileOutput, content: &str) -> Result<(), OutputError> {
        info!(output = %output, "Writing rendered configuration");
        let target = output.path();

        if !exists(target).await && !exists_parent(target).await {
            return Err(OutputError::PathUnavailable {
                path: target.to_path_buf(),
            });
        }

        let method = self.write_method(target).await;
        let tmp = self.temp_file(target, method);
        debug!(output = %output, tmp = %tmp.display(), method = ?method, "Using temporary file");

        tokio::fs::write(&tmp, content)
            .await
            .map_err(|source| OutputError::Io {
                op: "write",
                path: tmp.clone(),
                source,
            })?;

        if let Err(source) = move_to_target(&tmp, target, method).await {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                warn!(tmp = %tmp.display(), error = %e, "Failed to remove temporary file");
            }
            return Err(OutputError::Io {
                op: "move",
                path: target.to_path_buf(),
                source,
            });
        }

        let attributes = output.attributes();
        if attributes.uid.is_some() || attributes.gid.is_some() {
            let path = target.to_path_buf();
            let (uid, gid) = (attributes.uid, attributes.gid);
            tokio::task::spawn_blocking(move || std::os::unix::fs::chown(path, uid, gid))
                .await
                .unwrap_or_else(|e| Err(std::io::Error::other(e)))
                .map_err(|source| OutputError::Io {
                    op: "change owner of",
                    path: target.to_path_buf(),
                    source,
                })?;
        }
        if let Some(mode) = attributes.mode {
            let permissions = self.modes.to_permissions(mode);
            tokio::fs::set_permissions(target, Permissions::from_mode(permissions.mode()))
                .await
                .map_err(|source| OutputError::Io {
                    op: "set permissions of",
                    path: target.to_path_buf(),
                    source,
                })?;
        }

        debug!(output = %output, "Wrote rendered configuration");
        Ok(())
    }

    /// Write method of `target`, determined once then cached.
    ///
    /// Inspecting the filesystem blocks, so it runs on the blocking pool.
    pub async fn write_method(&self, target: &Path) -> WriteMethod {
        if let Some(&method) = self.methods().get(target) {
            return method;
        }

        let path = target.to_path_buf();
        let tmpdir = self.tmpdir.clone();
        let method = tokio::task::spawn_blocking(move || WriteMethod::for_path(&path, &tmpdir))
            .await
            .unwrap_or_else(|e| {
                warn!(path = %target.display(), error = %e, "Write method inspection failed, using tmpdir non-atomic copy write method");
                WriteMethod::TmpdirCopy
            });

        *self.methods().entry(target.to_path_buf()).or_insert(method)
    }

    fn methods(&self) -> MutexGuard<'_, HashMap<PathBuf, WriteMethod>> {
        self.methods.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn temp_file(&self, target: &Path, method: WriteMethod) -> PathBuf {
        let id = format!(
            "{}-{:016x}",
            chrono::Utc::now().timestamp(),
            rand::random::<u64>()
        );

        match method {
            WriteMethod::TmpdirAtomic | WriteMethod::TmpdirCopy => self
                .tmpdir
                .join(format!("{TMPFILE_PREFIX}{id}{TMPFILE_SUFFIX}")),
            WriteMethod::SiblingAtomic => {
                let mut name = target.file_name().unwrap_or_default().to_os_string();
                name.push(format!("{SIBLING_TMPFILE_INFIX}{id}"));
                target.with_file_name(name)
            }
        }
    }
}

async fn move_to_target(tmp: &Path, target: &Path, method: WriteMethod) -> std::io::Result<()> {
    if method.is_atomic() {
        tokio::fs::rename(tmp, target).await
    } else {
        tokio::fs::copy(tmp, target).await?;
        if let Err(e) = tokio::fs::remove_file(tmp).await {
            warn!(tmp = %tmp.display(), error = %e, "Failed to remove temporary file");
        }
        Ok(())
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn exists_parent(path: &Path) -> bool {
    match path.parent() {
        Some(parent) => exists(parent).await,
        None => false,
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod file_tests;
