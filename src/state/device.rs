// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device records and snapshots as reported by the hub REST API.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ParseError;

/// Kind of hub resource a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Lights, plugs, and other actuators.
    Lights,
    /// Sensors, switches, and pseudo-devices.
    Sensors,
}

impl ResourceType {
    /// Returns the REST path segment and topic segment for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lights => "lights",
            Self::Sensors => "sensors",
        }
    }

    /// Parses a resource discriminator (`"lights"`, `"sensors"`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lights" => Some(Self::Lights),
            "sensors" => Some(Self::Sensors),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hub-assigned device identifier.
///
/// Ids order the way the hub's JSON objects iterate: integer-like ids
/// first in numeric order, then everything else lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates an id from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        let canonical = !self.0.is_empty()
            && self.0.bytes().all(|b| b.is_ascii_digit())
            && !(self.0.len() > 1 && self.0.starts_with('0'));
        if canonical { self.0.parse().ok() } else { None }
    }
}

impl Ord for DeviceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for DeviceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One device as reported by `GET /api/<key>/lights` or `/sensors`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceRecord {
    /// Configured name.
    #[serde(default)]
    pub name: String,
    /// Current state fields.
    #[serde(default)]
    pub state: Map<String, Value>,
    /// Configuration fields.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Model identifier.
    #[serde(default)]
    pub modelid: Option<String>,
    /// Manufacturer name.
    #[serde(default, rename = "manufacturername")]
    pub manufacturer: Option<String>,
}

/// Full set of devices of one resource type.
///
/// A snapshot is immutable once built; the cache swaps whole snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    resource: ResourceType,
    devices: BTreeMap<DeviceId, DeviceRecord>,
}

impl DeviceSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn empty(resource: ResourceType) -> Self {
        Self {
            resource,
            devices: BTreeMap::new(),
        }
    }

    /// Builds a snapshot from `(id, record)` pairs.
    pub fn from_records<I>(resource: ResourceType, records: I) -> Self
    where
        I: IntoIterator<Item = (DeviceId, DeviceRecord)>,
    {
        Self {
            resource,
            devices: records.into_iter().collect(),
        }
    }

    /// Parses a REST response body, a JSON object keyed by device id.
    ///
    /// Entries that are not valid device records are logged and left out;
    /// the rest of the snapshot is kept.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the body is not a JSON object.
    pub fn from_json(resource: ResourceType, body: Value) -> Result<Self, ParseError> {
        let Value::Object(entries) = body else {
            return Err(ParseError::UnexpectedFormat(format!(
                "expected an object of {resource}, got {body}"
            )));
        };

        let mut devices = BTreeMap::new();
        for (id, raw) in entries {
            match serde_json::from_value::<DeviceRecord>(raw) {
                Ok(record) => {
                    devices.insert(DeviceId::new(id), record);
                }
                Err(e) => {
                    tracing::warn!(
                        resource = %resource,
                        id = %id,
                        error = %e,
                        "Skipping malformed device record"
                    );
                }
            }
        }

        Ok(Self { resource, devices })
    }

    /// Returns the resource type of this snapshot.
    #[must_use]
    pub fn resource(&self) -> ResourceType {
        self.resource
    }

    /// Looks up a device.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.get(&DeviceId::new(id))
    }

    /// Iterates devices in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &DeviceRecord)> {
        self.devices.iter()
    }

    /// Returns the number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if the snapshot has no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resource_type_round_trip() {
        assert_eq!(ResourceType::parse("lights"), Some(ResourceType::Lights));
        assert_eq!(ResourceType::parse("sensors"), Some(ResourceType::Sensors));
        assert_eq!(ResourceType::parse("groups"), None);
        assert_eq!(ResourceType::Sensors.to_string(), "sensors");
    }

    #[test]
    fn ids_order_numerically_then_lexically() {
        let mut ids: Vec<DeviceId> = ["10", "b", "2", "a", "1"]
            .into_iter()
            .map(DeviceId::from)
            .collect();
        ids.sort();
        let ordered: Vec<&str> = ids.iter().map(DeviceId::as_str).collect();
        assert_eq!(ordered, ["1", "2", "10", "a", "b"]);
    }

    #[test]
    fn leading_zero_is_not_numeric() {
        assert!(DeviceId::from("007") > DeviceId::from("8"));
    }

    #[test]
    fn signed_id_is_not_numeric() {
        assert_ne!(
            DeviceId::from("+7").cmp(&DeviceId::from("7")),
            Ordering::Equal
        );
        assert!(DeviceId::from("+7") > DeviceId::from("7"));

        let snapshot = DeviceSnapshot::from_json(
            ResourceType::Lights,
            json!({"7": {"name": "Lamp"}, "+7": {"name": "Other"}}),
        )
        .unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("+7").unwrap().name, "Other");
    }

    #[test]
    fn malformed_record_is_skipped() {
        let body = json!({
            "7": {"name": "Lamp"},
            "8": {"name": null},
            "9": {"name": "Desk", "modelid": 42}
        });

        let snapshot = DeviceSnapshot::from_json(ResourceType::Lights, body).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("7").unwrap().name, "Lamp");
        assert!(snapshot.get("8").is_none());
        assert!(snapshot.get("9").is_none());
    }

    #[test]
    fn parse_light_snapshot() {
        let body = json!({
            "3": {
                "name": "Kitchen Light",
                "state": {"on": true, "bri": 200, "reachable": true},
                "modelid": "LCT001",
                "manufacturername": "Philips",
                "type": "Extended color light"
            },
            "1": {"name": "Hall", "state": {"on": false}}
        });

        let snapshot = DeviceSnapshot::from_json(ResourceType::Lights, body).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.resource(), ResourceType::Lights);

        let kitchen = snapshot.get("3").unwrap();
        assert_eq!(kitchen.name, "Kitchen Light");
        assert_eq!(kitchen.state["bri"], json!(200));
        assert_eq!(kitchen.manufacturer.as_deref(), Some("Philips"));
        assert!(kitchen.config.is_empty());

        let first = snapshot.iter().next().unwrap().0;
        assert_eq!(first.as_str(), "1");
    }

    #[test]
    fn error_reply_is_rejected() {
        let body = json!([{"error": {"type": 1, "description": "unauthorized user"}}]);
        let err = DeviceSnapshot::from_json(ResourceType::Lights, body).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedFormat(_)));
    }
}
