// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Selection of the way an output file is replaced.
//!
//! A rename is only atomic within one filesystem, so the temporary file must be
//! created on the same filesystem as the target:
//!
//! - [`WriteMethod::TmpdirAtomic`] when the target directory shares the system
//!   temp directory's filesystem
//! - [`WriteMethod::SiblingAtomic`] otherwise, with the temporary file created
//!   next to the target
//! - [`WriteMethod::TmpdirCopy`] when the target filesystem cannot be
//!   determined: the temporary file is copied over the target, which is not
//!   atomic

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// How a rendered file replaces its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMethod {
    /// Temp directory file, renamed onto the target
    TmpdirAtomic,
    /// Temp directory file, copied onto the target
    TmpdirCopy,
    /// Sibling file, renamed onto the target
    SiblingAtomic,
}

impl WriteMethod {
    /// Whether the final move is an atomic rename
    #[must_use]
    pub fn is_atomic(self) -> bool {
        !matches!(self, Self::TmpdirCopy)
    }

    /// Pick the write method for `path`, given the system temp directory `tmpdir`.
    #[must_use]
    pub fn for_path(path: &Path, tmpdir: &Path) -> Self {
        let Some(dir) = target_directory(path) else {
            warn!(path = %path.display(), "Cannot determine the directory of output path, using tmpdir non-atomic copy write method");
            return Self::TmpdirCopy;
        };

        let target_dev = match std::fs::metadata(&dir) {
            Ok(meta) => meta.dev(),
            Err(e) => {
                warn!(
                    parent = %dir.display(),
                    error = %e,
                    "Cannot determine backing filesystem of path parent, using tmpdir non-atomic copy write method"
                );
                return Self::TmpdirCopy;
            }
        };

        match std::fs::metadata(tmpdir) {
            Ok(meta) if meta.dev() == target_dev => {
                trace!(path = %dir.display(), "tmpdir and path parent have the same backing filesystem, using tmpdir atomic move write method");
                Self::TmpdirAtomic
            }
            Ok(_) => {
                trace!(path = %dir.display(), "tmpdir and path parent have different backing filesystems, using sibling atomic move write method");
                Self::SiblingAtomic
            }
            Err(e) => {
                warn!(tmpdir = %tmpdir.display(), error = %e, "Cannot inspect tmpdir, using sibling atomic move write method");
                Self::SiblingAtomic
            }
        }
    }
}

/// Real directory holding `path` (or `path` itself if it is a directory).
fn target_directory(path: &Path) -> Option<PathBuf> {
    let existing = if path.exists() { path } else { path.parent()? };

    let real = existing.canonicalize().unwrap_or_else(|e| {
        warn!(path = %existing.display(), error = %e, "Cannot determine real absolute path");
        existing.to_path_buf()
    });

    if real.is_dir() {
        Some(real)
    } else {
        real.parent().map(Path::to_path_buf)
    }
}
