// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The unit of bridge output.

/// How a signal interacts with the change filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Published only if the value differs from the last one on the topic.
    OnChange,
    /// Always published; used for momentary events.
    Always,
}

/// One `(topic, value)` pair destined for the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSignal {
    /// Full topic, `{prefix}/{resource}/{device}/{field}`.
    pub topic: String,
    /// Normalized payload.
    pub value: String,
    /// Whether the broker should retain the message.
    pub retain: bool,
    /// Change filter behaviour.
    pub mode: PublishMode,
}

impl NormalizedSignal {
    /// Returns the last topic segment.
    #[must_use]
    pub fn field(&self) -> &str {
        self.topic.rsplit('/').next().unwrap_or_default()
    }
}
