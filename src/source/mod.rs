// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Template sources.
//!
//! A source describes where a template comes from. Sources are parsed from DSN
//! strings and used as registry keys, so equality is by value. Only the `file`
//! scheme is implemented; each source kind has a matching watcher that reports
//! content changes.

pub mod file;

pub use file::FileWatcher;

use crate::constants::{FILE_SCHEME, SOURCE_PARAM_PERIOD};
use crate::dsn::Dsn;
use crate::duration::parse_duration;
use crate::errors::DescriptorError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where a template is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    /// A file polled for content changes
    File(FileSource),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(source) => source.fmt(f),
        }
    }
}

/// Parse a source DSN such as `file:///etc/pools.json?period=5s`.
///
/// # Errors
///
/// Returns an error if the DSN is malformed, its scheme has no watcher
/// implementation, or its parameters are invalid.
pub fn parse_source(input: &str, default_period: Duration) -> Result<Source, DescriptorError> {
    let dsn = Dsn::parse(input)?;

    match dsn.protocol() {
        FILE_SCHEME => Ok(Source::File(FileSource::from_dsn(&dsn, default_period)?)),
        other => Err(DescriptorError::UnsupportedType {
            kind: "source",
            scheme: other.to_string(),
        }),
    }
}

/// A template file polled every `period`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileSource {
    path: PathBuf,
    period: Duration,
}

impl FileSource {
    /// Create a file source.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not absolute or `period` is zero.
    pub fn new(path: impl Into<PathBuf>, period: Duration) -> Result<Self, DescriptorError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(DescriptorError::RelativePath {
                path: path.display().to_string(),
            });
        }
        if period.is_zero() {
            return Err(DescriptorError::InvalidParameter {
                input: path.display().to_string(),
                name: SOURCE_PARAM_PERIOD.to_string(),
                reason: "poll period must be positive".to_string(),
            });
        }
        Ok(Self { path, period })
    }

    /// Build a file source from a `file://` DSN, honoring its `period` parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is not `file`, the path is relative, or the
    /// period cannot be parsed.
    pub fn from_dsn(dsn: &Dsn, default_period: Duration) -> Result<Self, DescriptorError> {
        if dsn.protocol() != FILE_SCHEME {
            return Err(DescriptorError::UnsupportedType {
                kind: "source",
                scheme: dsn.protocol().to_string(),
            });
        }

        let period = match dsn.parameter(SOURCE_PARAM_PERIOD) {
            None => default_period,
            Some(value) => parse_duration(value.unwrap_or_default()).map_err(|e| {
                DescriptorError::InvalidParameter {
                    input: dsn.value().to_string(),
                    name: SOURCE_PARAM_PERIOD.to_string(),
                    reason: format!("{e:#}"),
                }
            })?,
        };

        Self::new(dsn.value(), period)
    }

    /// Absolute path of the template file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delay between two reads of the file
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file://{}", self.path.display())
    }
}
