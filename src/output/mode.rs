// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Octal file mode translation.
//!
//! A mode such as `0640` is split into its owner, group and other digits, and
//! each digit into read, write and execute flags.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

const PERM_R: u32 = 0b100;
const PERM_W: u32 = 0b010;
const PERM_X: u32 = 0b001;
const PERM_MASK: u32 = 0b111;

/// Access flags of one principal (owner, group or other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Access {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Access {
    fn from_digit(digit: u32) -> Self {
        Self {
            read: digit & PERM_R == PERM_R,
            write: digit & PERM_W == PERM_W,
            execute: digit & PERM_X == PERM_X,
        }
    }

    fn digit(self) -> u32 {
        let mut digit = 0;
        if self.read {
            digit |= PERM_R;
        }
        if self.write {
            digit |= PERM_W;
        }
        if self.execute {
            digit |= PERM_X;
        }
        digit
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.read, 'r'),
            flag(self.write, 'w'),
            flag(self.execute, 'x')
        )
    }
}

/// Permissions of a file, as shown by `ls -l` (e.g. `rw-r-----`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PosixPermissions {
    pub owner: Access,
    pub group: Access,
    pub other: Access,
}

impl PosixPermissions {
    /// Permission bits suitable for `std::fs::Permissions::from_mode`.
    #[must_use]
    pub fn mode(&self) -> u32 {
        (self.owner.digit() << 6) | (self.group.digit() << 3) | self.other.digit()
    }
}

impl fmt::Display for PosixPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, self.group, self.other)
    }
}

/// Converts octal modes to [`PosixPermissions`], remembering every conversion.
///
/// The cache lives as long as the converter; each writer owns its own.
#[derive(Debug, Default)]
pub struct ModeConverter {
    cache: Mutex<HashMap<u32, PosixPermissions>>,
}

impl ModeConverter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the lowest 9 bits of `mode`. Higher bits (setuid, sticky...)
    /// are ignored.
    pub fn to_permissions(&self, mode: u32) -> PosixPermissions {
        *self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(mode)
            .or_insert_with(|| PosixPermissions {
                owner: Access::from_digit((mode >> 6) & PERM_MASK),
                group: Access::from_digit((mode >> 3) & PERM_MASK),
                other: Access::from_digit(mode & PERM_MASK),
            })
    }

    /// Number of distinct modes converted so far
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
