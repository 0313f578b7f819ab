// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion of raw hub values into signal payloads.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Fields the hub reports in hundredths of a unit.
const HUNDREDTHS_FIELDS: &[&str] = &["temperature", "humidity"];

/// Normalizes a raw field value into a signal payload.
///
/// - `true`/`"true"` become `"1"`, `false`/`"false"` become `"0"`
/// - `null` becomes `"0"`
/// - `temperature` and `humidity` are divided by 100 with two decimals
/// - arrays are joined with `,`; everything else is stringified
///
/// # Examples
///
/// ```
/// use deconz_bridge::translate::normalize_value;
/// use serde_json::json;
///
/// assert_eq!(normalize_value("on", &json!(true)), "1");
/// assert_eq!(normalize_value("temperature", &json!(2150)), "21.50");
/// assert_eq!(normalize_value("xy", &json!([0.3, 0.4])), "0.3,0.4");
/// ```
#[must_use]
pub fn normalize_value(field: &str, value: &Value) -> String {
    match value {
        Value::Null => return "0".to_string(),
        Value::Bool(flag) => return bool_flag(*flag).to_string(),
        Value::String(s) if s == "true" => return "1".to_string(),
        Value::String(s) if s == "false" => return "0".to_string(),
        _ => {}
    }

    if HUNDREDTHS_FIELDS.contains(&field)
        && let Some(n) = as_number(value)
    {
        return format!("{:.2}", n / 100.0);
    }

    stringify(value)
}

/// Returns `"1"` or `"0"`.
#[must_use]
pub(crate) fn bool_flag(flag: bool) -> &'static str {
    if flag { "1" } else { "0" }
}

/// Reads a number, accepting numeric strings.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        // 1.0 prints as "1"
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            (f as i64).to_string()
        }
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Freshness of a device judged from its `lastupdated` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Updated within the threshold.
    Fresh,
    /// Not updated within the threshold.
    Stale,
    /// The timestamp could not be read.
    Unknown,
}

/// Parses a hub timestamp (`2024-03-01T10:15:00` or with fractional
/// seconds or a zone suffix). Zone-less timestamps are UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Judges whether `lastupdated` is older than `threshold` relative to
/// `now`, comparing both in `zone`.
#[must_use]
pub fn staleness(lastupdated: &str, now: DateTime<Utc>, zone: Tz, threshold: TimeDelta) -> Staleness {
    let Some(updated) = parse_timestamp(lastupdated) else {
        return Staleness::Unknown;
    };

    let now = now.with_timezone(&zone);
    let cutoff = now - threshold;
    if updated.with_timezone(&zone) < cutoff {
        Staleness::Stale
    } else {
        Staleness::Fresh
    }
}
