// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device change events.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::state::{DeviceId, DeviceRecord, ResourceType};

/// Where a change event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Pushed by the hub over the feed, usually caused by a user action.
    Live,
    /// Synthesized from a full REST poll.
    Query,
}

impl Origin {
    /// Returns `true` for poll-originated events.
    #[must_use]
    pub fn is_query(self) -> bool {
        matches!(self, Self::Query)
    }
}

/// A single device's delta.
///
/// Mirrors the hub's feed message layout (`r`, `id`, `state`, `config`),
/// which is also what a poll entry is reshaped into.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChangeEvent {
    /// Resource discriminator (`"lights"`, `"sensors"`, ...).
    #[serde(rename = "r", default)]
    pub resource: Option<String>,
    /// Device id.
    #[serde(default)]
    pub id: Option<String>,
    /// Changed state fields.
    #[serde(default)]
    pub state: Option<Map<String, Value>>,
    /// Changed configuration fields.
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
    /// Model identifier, present on poll-derived events.
    #[serde(default)]
    pub modelid: Option<String>,
    /// Manufacturer, present on poll-derived events.
    #[serde(default, rename = "manufacturername")]
    pub manufacturer: Option<String>,
}

impl ChangeEvent {
    /// Builds the event a poll produces for one snapshot entry.
    #[must_use]
    pub fn from_record(resource: ResourceType, id: &DeviceId, record: &DeviceRecord) -> Self {
        Self {
            resource: Some(resource.as_str().to_string()),
            id: Some(id.as_str().to_string()),
            state: Some(record.state.clone()),
            config: Some(record.config.clone()),
            modelid: record.modelid.clone(),
            manufacturer: record.manufacturer.clone(),
        }
    }
}

/// A message received on the push feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedMessage {
    /// Event discriminator (`"changed"`, `"added"`, `"deleted"`, ...).
    #[serde(rename = "e", default)]
    pub event: Option<String>,
    /// The device delta carried by the message.
    #[serde(flatten)]
    pub change: ChangeEvent,
}

impl FeedMessage {
    /// Parses a feed text frame.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the frame is empty or not a JSON object.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::UnexpectedFormat("empty feed message".to_string()));
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Returns the change if this is a `changed` message.
    #[must_use]
    pub fn into_change(self) -> Option<ChangeEvent> {
        (self.event.as_deref() == Some("changed")).then_some(self.change)
    }
}
