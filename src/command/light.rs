// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Light commands received on the bus.

use crate::error::ParseError;
use crate::protocol::LightStateUpdate;

/// Components of an inbound command topic.
///
/// The layout is `{prefix}/lights/{device_ref}/{action}/set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTopic<'a> {
    /// Device id or name as written in the topic.
    pub device_ref: &'a str,
    /// Requested action (`brightness`, `state`, ...).
    pub action: &'a str,
}

impl<'a> CommandTopic<'a> {
    /// Parses `topic` under `prefix`.
    ///
    /// Returns `None` for topics outside the command namespace.
    #[must_use]
    pub fn parse(prefix: &str, topic: &'a str) -> Option<Self> {
        let rest = topic.strip_prefix(prefix)?.strip_prefix("/lights/")?;
        let rest = rest.strip_suffix("/set")?;
        let (device_ref, action) = rest.split_once('/')?;

        if device_ref.is_empty() || action.is_empty() || action.contains('/') {
            return None;
        }

        Some(Self { device_ref, action })
    }

    /// Returns `true` if the reference is a hub id rather than a name.
    #[must_use]
    pub fn is_numeric_ref(&self) -> bool {
        !self.device_ref.is_empty() && self.device_ref.bytes().all(|b| b.is_ascii_digit())
    }
}

/// A parsed light command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    /// Set brightness; zero also switches off.
    Brightness(u8),
    /// Switch on or off.
    Power(bool),
}

impl LightCommand {
    /// Builds a command from a topic action and message payload.
    ///
    /// Returns `Ok(None)` for actions that are not handled.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` if the payload is not a finite
    /// number.
    pub fn from_action(action: &str, payload: &str) -> Result<Option<Self>, ParseError> {
        let command = if action.contains("brightness") {
            Self::Brightness(to_level(parse_number(action, payload)?))
        } else if action.contains("state") {
            Self::Power(parse_number(action, payload)? > 0.0)
        } else {
            return Ok(None);
        };
        Ok(Some(command))
    }

    /// Returns the hub request body for this command.
    #[must_use]
    pub fn to_update(self) -> LightStateUpdate {
        match self {
            Self::Brightness(level) => LightStateUpdate::brightness(level),
            Self::Power(on) => LightStateUpdate::power(on),
        }
    }
}

fn parse_number(action: &str, payload: &str) -> Result<f64, ParseError> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ParseError::InvalidValue {
            field: action.to_string(),
            message: format!("expected a number, got {payload:?}"),
        })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_level(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_topic() {
        let topic = CommandTopic::parse("/deconz", "/deconz/lights/lamp/brightness/set").unwrap();
        assert_eq!(topic.device_ref, "lamp");
        assert_eq!(topic.action, "brightness");
        assert!(!topic.is_numeric_ref());

        let topic = CommandTopic::parse("home", "home/lights/7/state/set").unwrap();
        assert!(topic.is_numeric_ref());
    }

    #[test]
    fn foreign_topics_ignored() {
        assert_eq!(CommandTopic::parse("/deconz", "/deconz/lights/lamp/state"), None);
        assert_eq!(CommandTopic::parse("/deconz", "/other/lights/lamp/state/set"), None);
        assert_eq!(CommandTopic::parse("/deconz", "/deconz/sensors/x/state/set"), None);
        assert_eq!(CommandTopic::parse("/deconz", "/deconz/lights/lamp/set"), None);
        assert_eq!(CommandTopic::parse("/deconz", "/deconz/lights/a/b/c/set"), None);
    }

    #[test]
    fn brightness_command() {
        assert_eq!(
            LightCommand::from_action("brightness", "0").unwrap(),
            Some(LightCommand::Brightness(0))
        );
        assert_eq!(
            LightCommand::from_action("brightness", " 127.6 ").unwrap(),
            Some(LightCommand::Brightness(128))
        );
        assert_eq!(
            LightCommand::from_action("brightness", "900").unwrap(),
            Some(LightCommand::Brightness(255))
        );
        assert_eq!(
            LightCommand::from_action("brightness", "-4").unwrap(),
            Some(LightCommand::Brightness(0))
        );
    }

    #[test]
    fn state_command() {
        assert_eq!(
            LightCommand::from_action("state", "1").unwrap(),
            Some(LightCommand::Power(true))
        );
        assert_eq!(
            LightCommand::from_action("state", "0").unwrap(),
            Some(LightCommand::Power(false))
        );
    }

    #[test]
    fn bad_payload_rejected() {
        assert!(LightCommand::from_action("brightness", "bright").is_err());
        assert!(LightCommand::from_action("state", "").is_err());
        assert!(LightCommand::from_action("state", "NaN").is_err());
    }

    #[test]
    fn unknown_action_ignored() {
        assert_eq!(LightCommand::from_action("color", "red").unwrap(), None);
    }

    #[test]
    fn update_bodies() {
        assert_eq!(
            LightCommand::Brightness(0).to_update(),
            LightStateUpdate { bri: Some(0), on: false }
        );
        assert_eq!(
            LightCommand::Power(true).to_update(),
            LightStateUpdate { bri: None, on: true }
        );
    }
}
