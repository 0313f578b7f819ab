// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic-safe device names.

/// Symbols removed from device names before they become topic segments.
const DISALLOWED: &[char] = &['+', '\\', '&', '*', '%', '$', '#', '@', '!'];

/// Normalizes a configured device name into a topic segment.
///
/// The name is stripped of `+ \ & * % $ # @ !`, trimmed, lowercased, and
/// every run of whitespace, hyphens, or underscores becomes one `_`.
///
/// # Examples
///
/// ```
/// use deconz_bridge::state::normalize_name;
///
/// assert_eq!(normalize_name("Kitchen Light"), "kitchen_light");
/// assert_eq!(normalize_name("Hall - Ceiling #2"), "hall_ceiling_2");
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !DISALLOWED.contains(c)).collect();

    let mut out = String::with_capacity(cleaned.len());
    let mut pending_separator = false;

    for c in cleaned.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push('_');
        }
        pending_separator = false;
        out.extend(c.to_lowercase());
    }

    out
}
