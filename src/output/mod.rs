// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rendered configuration outputs.
//!
//! An output describes where rendered content is written and with which POSIX
//! attributes. Outputs are parsed from DSN strings such as
//! `file:///etc/mcrouter/config.json?uid=0&gid=0&mode=0640`. Only the `file`
//! scheme is implemented, by [`FileWriter`].

pub mod file;
pub mod mode;
pub mod write_method;

pub use file::FileWriter;
pub use mode::{ModeConverter, PosixPermissions};
pub use write_method::WriteMethod;

use crate::constants::{
    DEFAULT_OUTPUT_MODE, FILE_SCHEME, MAX_OUTPUT_MODE, MIN_OUTPUT_MODE, OUTPUT_PARAM_GID,
    OUTPUT_PARAM_MODE, OUTPUT_PARAM_UID,
};
use crate::dsn::Dsn;
use crate::errors::DescriptorError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where rendered content is written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Output {
    /// A file replaced atomically on every change
    File(FileOutput),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(output) => output.fmt(f),
        }
    }
}

/// Parse an output DSN such as `file:///run/config.json?mode=0640`.
///
/// # Errors
///
/// Returns an error if the DSN is malformed, its scheme has no writer
/// implementation, or its parameters are invalid.
pub fn parse_output(input: &str) -> Result<Output, DescriptorError> {
    let dsn = Dsn::parse(input)?;

    match dsn.protocol() {
        FILE_SCHEME => Ok(Output::File(FileOutput::from_dsn(&dsn)?)),
        other => Err(DescriptorError::UnsupportedType {
            kind: "output",
            scheme: other.to_string(),
        }),
    }
}

/// POSIX attributes applied to an output file after each write.
///
/// Unset values leave the corresponding attribute of the file unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attributes {
    /// Owner user id
    pub uid: Option<u32>,
    /// Owner group id
    pub gid: Option<u32>,
    /// Permission bits, between `0600` and `0777`
    pub mode: Option<u32>,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            uid: None,
            gid: None,
            mode: Some(DEFAULT_OUTPUT_MODE),
        }
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[uid=")?;
        match self.uid {
            Some(uid) => write!(f, "{uid}")?,
            None => f.write_str("-")?,
        }
        f.write_str(", gid=")?;
        match self.gid {
            Some(gid) => write!(f, "{gid}")?,
            None => f.write_str("-")?,
        }
        f.write_str(", mode=")?;
        match self.mode {
            Some(mode) => write!(f, "0{mode:o}")?,
            None => f.write_str("-")?,
        }
        f.write_str("]")
    }
}

/// A file output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileOutput {
    path: PathBuf,
    attributes: Attributes,
}

impl FileOutput {
    /// Create a file output.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not absolute or the mode is out of range.
    pub fn new(path: impl Into<PathBuf>, attributes: Attributes) -> Result<Self, DescriptorError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(DescriptorError::RelativePath {
                path: path.display().to_string(),
            });
        }
        if let Some(mode) = attributes.mode {
            if !(MIN_OUTPUT_MODE..=MAX_OUTPUT_MODE).contains(&mode) {
                return Err(DescriptorError::InvalidParameter {
                    input: path.display().to_string(),
                    name: OUTPUT_PARAM_MODE.to_string(),
                    reason: format!(
                        "0{mode:o} is outside of 0{MIN_OUTPUT_MODE:o}..=0{MAX_OUTPUT_MODE:o}"
                    ),
                });
            }
        }
        Ok(Self { path, attributes })
    }

    /// Build a file output from a `file://` DSN and its `uid`, `gid` and `mode`
    /// parameters. Unknown parameters are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is not `file`, the path is relative, or
    /// a parameter value is invalid.
    pub fn from_dsn(dsn: &Dsn) -> Result<Self, DescriptorError> {
        if dsn.protocol() != FILE_SCHEME {
            return Err(DescriptorError::UnsupportedType {
                kind: "output",
                scheme: dsn.protocol().to_string(),
            });
        }

        let mut attributes = Attributes::default();
        if dsn.contains(OUTPUT_PARAM_UID) {
            attributes.uid = Some(parse_parameter(dsn, OUTPUT_PARAM_UID, 10)?);
        }
        if dsn.contains(OUTPUT_PARAM_GID) {
            attributes.gid = Some(parse_parameter(dsn, OUTPUT_PARAM_GID, 10)?);
        }
        if dsn.contains(OUTPUT_PARAM_MODE) {
            attributes.mode = Some(parse_parameter(dsn, OUTPUT_PARAM_MODE, 8)?);
        }

        Self::new(dsn.value(), attributes)
    }

    /// Absolute path of the output file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl fmt::Display for FileOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file://{}{}", self.path.display(), self.attributes)
    }
}

/// Parse the first value of `name` as an unsigned integer in `radix`.
fn parse_parameter(dsn: &Dsn, name: &str, radix: u32) -> Result<u32, DescriptorError> {
    let invalid = |reason: String| DescriptorError::InvalidParameter {
        input: dsn.value().to_string(),
        name: name.to_string(),
        reason,
    };

    let value = dsn
        .parameter(name)
        .flatten()
        .ok_or_else(|| invalid("a value is required".to_string()))?;

    u32::from_str_radix(value, radix)
        .map_err(|e| invalid(format!("'{value}' is not a base {radix} number: {e}")))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
