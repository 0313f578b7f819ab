// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last known device snapshots and id/name resolution.

use std::sync::Arc;

use parking_lot::RwLock;

use super::device::{DeviceId, DeviceSnapshot, ResourceType};
use super::naming::normalize_name;

/// Holds the most recent light and sensor snapshots.
///
/// Snapshots are swapped whole behind an `Arc`, so a reader that grabbed
/// the previous snapshot keeps a complete view while a newer one is
/// installed.
///
/// # Examples
///
/// ```
/// use deconz_bridge::state::{DeviceCache, DeviceSnapshot, DeviceRecord, ResourceType};
///
/// let cache = DeviceCache::new();
/// assert_eq!(cache.resolve_name(ResourceType::Lights, "3"), "3");
///
/// let record = DeviceRecord {
///     name: "Kitchen Light".into(),
///     state: Default::default(),
///     config: Default::default(),
///     modelid: None,
///     manufacturer: None,
/// };
/// cache.replace(DeviceSnapshot::from_records(
///     ResourceType::Lights,
///     [("3".into(), record)],
/// ));
///
/// assert_eq!(cache.resolve_name(ResourceType::Lights, "3"), "kitchen_light");
/// assert_eq!(cache.resolve_id("Kitchen Light").as_deref(), Some("3"));
/// ```
#[derive(Debug)]
pub struct DeviceCache {
    lights: RwLock<Arc<DeviceSnapshot>>,
    sensors: RwLock<Arc<DeviceSnapshot>>,
}

impl DeviceCache {
    /// Creates a cache with empty snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lights: RwLock::new(Arc::new(DeviceSnapshot::empty(ResourceType::Lights))),
            sensors: RwLock::new(Arc::new(DeviceSnapshot::empty(ResourceType::Sensors))),
        }
    }

    fn slot(&self, resource: ResourceType) -> &RwLock<Arc<DeviceSnapshot>> {
        match resource {
            ResourceType::Lights => &self.lights,
            ResourceType::Sensors => &self.sensors,
        }
    }

    /// Returns the current snapshot for a resource type.
    #[must_use]
    pub fn snapshot(&self, resource: ResourceType) -> Arc<DeviceSnapshot> {
        Arc::clone(&self.slot(resource).read())
    }

    /// Installs a new snapshot, replacing the previous one whole.
    pub fn replace(&self, snapshot: DeviceSnapshot) -> Arc<DeviceSnapshot> {
        let resource = snapshot.resource();
        let snapshot = Arc::new(snapshot);
        *self.slot(resource).write() = Arc::clone(&snapshot);

        tracing::debug!(
            resource = %resource,
            devices = snapshot.len(),
            "Replaced device snapshot"
        );
        snapshot
    }

    /// Returns the topic-safe name of a device, or the raw id if the device
    /// is not in the current snapshot or its name normalizes to nothing.
    #[must_use]
    pub fn resolve_name(&self, resource: ResourceType, id: &str) -> String {
        self.snapshot(resource)
            .get(id)
            .map(|device| normalize_name(&device.name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| id.to_string())
    }

    /// Finds the id of the first light whose normalized name matches
    /// `name`'s.
    ///
    /// Duplicate names are not detected; the lowest id wins.
    #[must_use]
    pub fn resolve_id(&self, name: &str) -> Option<String> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        self.snapshot(ResourceType::Lights)
            .iter()
            .find(|(_, device)| normalize_name(&device.name) == wanted)
            .map(|(id, _)| DeviceId::as_str(id).to_string())
    }
}

impl Default for DeviceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn lights(body: serde_json::Value) -> DeviceSnapshot {
        DeviceSnapshot::from_json(ResourceType::Lights, body).unwrap()
    }

    #[test]
    fn unknown_id_resolves_to_itself() {
        let cache = DeviceCache::new();
        assert_eq!(cache.resolve_name(ResourceType::Lights, "3"), "3");
        assert_eq!(cache.resolve_name(ResourceType::Sensors, "12"), "12");
    }

    #[test]
    fn known_id_resolves_to_normalized_name() {
        let cache = DeviceCache::new();
        cache.replace(lights(json!({"3": {"name": "Kitchen Light"}})));
        assert_eq!(cache.resolve_name(ResourceType::Lights, "3"), "kitchen_light");
        assert_eq!(cache.resolve_name(ResourceType::Sensors, "3"), "3");
    }

    #[test]
    fn resolve_id_compares_normalized_names() {
        let cache = DeviceCache::new();
        cache.replace(lights(json!({
            "7": {"name": "Lamp"},
            "9": {"name": "Desk Lamp"}
        })));

        assert_eq!(cache.resolve_id("lamp").as_deref(), Some("7"));
        assert_eq!(cache.resolve_id("desk_lamp").as_deref(), Some("9"));
        assert_eq!(cache.resolve_id("Desk-Lamp").as_deref(), Some("9"));
        assert_eq!(cache.resolve_id("garage"), None);
    }

    #[test]
    fn symbol_only_name_resolves_to_id() {
        let cache = DeviceCache::new();
        cache.replace(lights(json!({
            "5": {"name": "!!!"},
            "6": {"name": " - "},
            "7": {"name": ""}
        })));

        assert_eq!(cache.resolve_name(ResourceType::Lights, "5"), "5");
        assert_eq!(cache.resolve_name(ResourceType::Lights, "6"), "6");
        assert_eq!(cache.resolve_name(ResourceType::Lights, "7"), "7");
        assert_eq!(cache.resolve_id("###"), None);
    }

    #[test]
    fn resolve_id_duplicate_names_first_match_wins() {
        let cache = DeviceCache::new();
        cache.replace(lights(json!({
            "12": {"name": "Lamp"},
            "4": {"name": "lamp"}
        })));
        assert_eq!(cache.resolve_id("lamp").as_deref(), Some("4"));
    }

    #[test]
    fn replace_swaps_whole_snapshot() {
        let cache = DeviceCache::new();
        cache.replace(lights(json!({"1": {"name": "Old"}, "2": {"name": "Other"}})));
        let before = cache.snapshot(ResourceType::Lights);

        cache.replace(lights(json!({"1": {"name": "New"}})));

        // A reader holding the old snapshot still sees it intact.
        assert_eq!(before.len(), 2);
        assert_eq!(before.get("1").unwrap().name, "Old");

        assert_eq!(cache.snapshot(ResourceType::Lights).len(), 1);
        assert_eq!(cache.resolve_name(ResourceType::Lights, "1"), "new");
        assert_eq!(cache.resolve_name(ResourceType::Lights, "2"), "2");
    }
}
