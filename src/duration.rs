// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for human-readable and ISO-8601 duration strings.
//!
//! Used for the `period` parameter of file sources. Two styles are accepted:
//!
//! - **Simple**: an integer followed by an optional unit, e.g. `500ms`, `42s`,
//!   `5m`, `1h`, `2d`. A bare integer is read as milliseconds.
//! - **ISO-8601**: `PT42S`, `PT1M30S`, `P1DT2H`, `PT0.5S` (case-insensitive).

use anyhow::{bail, Context, Result};
use std::time::Duration;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;
const SECONDS_PER_DAY: u64 = 86400;

/// Parse a duration string in either simple or ISO-8601 style.
///
/// # Examples
///
/// ```
/// use poolwatch::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("42s").unwrap(), Duration::from_secs(42));
/// assert_eq!(parse_duration("PT42S").unwrap(), Duration::from_secs(42));
/// assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
///
/// assert!(parse_duration("").is_err());
/// assert!(parse_duration("10x").is_err());
/// ```
///
/// # Errors
///
/// Returns an error if the string matches neither style, is negative, or overflows.
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();
    if trimmed.is_empty() {
        bail!("Duration string cannot be empty");
    }

    if trimmed.starts_with(['P', 'p']) {
        return parse_iso8601(trimmed)
            .with_context(|| format!("Invalid ISO-8601 duration '{duration_str}'"));
    }

    parse_simple(trimmed)
}

fn parse_simple(input: &str) -> Result<Duration> {
    let split_pos = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());

    let (value_str, unit) = input.split_at(split_pos);
    if value_str.is_empty() {
        bail!("Duration '{input}' must start with a non-negative integer");
    }

    let value: u64 = value_str
        .parse()
        .with_context(|| format!("Duration value '{value_str}' is not a valid integer"))?;

    let duration = match unit {
        "ns" => Duration::from_nanos(value),
        "us" => Duration::from_micros(value),
        "" | "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(
            value
                .checked_mul(SECONDS_PER_MINUTE)
                .context("Duration value too large (overflow)")?,
        ),
        "h" => Duration::from_secs(
            value
                .checked_mul(SECONDS_PER_HOUR)
                .context("Duration value too large (overflow)")?,
        ),
        "d" => Duration::from_secs(
            value
                .checked_mul(SECONDS_PER_DAY)
                .context("Duration value too large (overflow)")?,
        ),
        _ => bail!(
            "Unsupported duration unit '{unit}'. Use ns, us, ms, s, m, h or d, or an ISO-8601 duration"
        ),
    };

    Ok(duration)
}

fn parse_iso8601(input: &str) -> Result<Duration> {
    let upper = input.to_ascii_uppercase();
    let body = &upper[1..];

    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                bail!("time designator 'T' must be followed by a component");
            }
            (date, Some(time))
        }
        None => (body, None),
    };

    if date_part.is_empty() && time_part.is_none() {
        bail!("no duration components");
    }

    let mut total = Duration::ZERO;

    for (value, designator) in components(date_part)? {
        let secs = match designator {
            'D' => SECONDS_PER_DAY,
            other => bail!("unsupported date component '{other}'"),
        };
        total = add(total, whole_seconds(&value, secs)?)?;
    }

    for (value, designator) in components(time_part.unwrap_or_default())? {
        match designator {
            'H' => total = add(total, whole_seconds(&value, SECONDS_PER_HOUR)?)?,
            'M' => total = add(total, whole_seconds(&value, SECONDS_PER_MINUTE)?)?,
            'S' => {
                let seconds: f64 = value
                    .parse()
                    .with_context(|| format!("'{value}' is not a number of seconds"))?;
                let secs = Duration::try_from_secs_f64(seconds)
                    .with_context(|| format!("'{value}' is out of range for seconds"))?;
                total = add(total, secs)?;
            }
            other => bail!("unsupported time component '{other}'"),
        }
    }

    Ok(total)
}

/// Split `1D` / `1H30M0.5S` into `(value, designator)` pairs.
fn components(part: &str) -> Result<Vec<(String, char)>> {
    let mut out = Vec::new();
    let mut value = String::new();

    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' {
            value.push(c);
        } else {
            if value.is_empty() {
                bail!("component '{c}' has no value");
            }
            out.push((std::mem::take(&mut value), c));
        }
    }

    if !value.is_empty() {
        bail!("trailing value '{value}' has no designator");
    }

    Ok(out)
}

fn add(total: Duration, more: Duration) -> Result<Duration> {
    total
        .checked_add(more)
        .context("Duration value too large (overflow)")
}

fn whole_seconds(value: &str, unit_secs: u64) -> Result<Duration> {
    let n: u64 = value
        .parse()
        .with_context(|| format!("'{value}' is not a non-negative integer"))?;
    let secs = n
        .checked_mul(unit_secs)
        .context("Duration value too large (overflow)")?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
