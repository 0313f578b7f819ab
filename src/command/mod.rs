// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound bus commands.
//!
//! Commands arrive on `{prefix}/lights/{device}/{action}/set`, where
//! `{device}` is a hub id or a device name in any spelling that normalizes
//! to the same topic name.
//!
//! | Action       | Payload | Hub request body          |
//! |--------------|---------|---------------------------|
//! | `brightness` | `0-255` | `{"bri": n, "on": n > 0}` |
//! | `state`      | number  | `{"on": n > 0}`           |
//!
//! # Examples
//!
//! ```
//! use deconz_bridge::command::{CommandTopic, LightCommand};
//!
//! let topic = CommandTopic::parse("/deconz", "/deconz/lights/lamp/brightness/set").unwrap();
//! assert_eq!(topic.device_ref, "lamp");
//!
//! let command = LightCommand::from_action(topic.action, "0").unwrap();
//! assert_eq!(command, Some(LightCommand::Brightness(0)));
//! ```

mod light;

use std::sync::Arc;

pub use light::{CommandTopic, LightCommand};

use crate::protocol::HubClient;
use crate::state::DeviceCache;

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The message was not a usable command and nothing was sent.
    Dropped,
    /// The hub accepted the request.
    Sent,
    /// The request to the hub failed.
    Failed,
}

/// Routes inbound command messages to the hub.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    topic_prefix: String,
    hub: HubClient,
    cache: Arc<DeviceCache>,
}

impl CommandRouter {
    /// Creates a router for commands under `topic_prefix`.
    pub fn new(topic_prefix: impl Into<String>, hub: HubClient, cache: Arc<DeviceCache>) -> Self {
        Self {
            topic_prefix: topic_prefix.into(),
            hub,
            cache,
        }
    }

    /// Resolves a message into the target light id and command.
    ///
    /// Returns `None` (after logging) if the topic is not a command, the
    /// device name is unknown, the action is unsupported, or the payload
    /// is not a number.
    #[must_use]
    pub fn resolve(&self, topic: &str, payload: &str) -> Option<(String, LightCommand)> {
        let Some(parsed) = CommandTopic::parse(&self.topic_prefix, topic) else {
            tracing::trace!(topic = %topic, "Ignoring non-command topic");
            return None;
        };

        let id = if parsed.is_numeric_ref() {
            parsed.device_ref.to_string()
        } else if let Some(id) = self.cache.resolve_id(parsed.device_ref) {
            id
        } else {
            tracing::warn!(device = %parsed.device_ref, "Unknown light, dropping command");
            return None;
        };

        match LightCommand::from_action(parsed.action, payload) {
            Ok(Some(command)) => Some((id, command)),
            Ok(None) => {
                tracing::debug!(action = %parsed.action, "Unsupported light action");
                None
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Dropping command");
                None
            }
        }
    }

    /// Handles one inbound message. Failed requests are not retried.
    pub async fn handle(&self, topic: &str, payload: &str) -> CommandOutcome {
        let Some((id, command)) = self.resolve(topic, payload) else {
            return CommandOutcome::Dropped;
        };

        let update = command.to_update();
        match self.hub.set_light_state(&id, &update).await {
            Ok(reply) => {
                tracing::info!(id = %id, ?update, %reply, "Light command sent");
                CommandOutcome::Sent
            }
            Err(e) => {
                tracing::error!(id = %id, ?update, error = %e, "Light command failed");
                CommandOutcome::Failed
            }
        }
    }
}
