// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Translation of raw device changes into bus signals.
//!
//! The [`EventTranslator`] turns one [`ChangeEvent`] into a list of
//! [`NormalizedSignal`]s and hands them to the change-filtered publisher.
//!
//! # Topic layout
//!
//! ```text
//! {prefix}/{resource}/{device name or id}/{field}
//!
//! /deconz/lights/kitchen_light/brightness   → "200"
//! /deconz/lights/kitchen_light/state        → "1"
//! /deconz/sensors/hall_motion/presence      → "0"
//! /deconz/sensors/hall_motion/reachable     → "1"
//! ```
//!
//! # Field mapping
//!
//! | State field  | Topic         | Notes                                     |
//! |--------------|---------------|-------------------------------------------|
//! | `lastupdated`| `lastupdated` | Also drives `reachable`                   |
//! | `buttonevent`| `buttonevent` | Live events only, never retained          |
//! | `open`       | `contact`     |                                           |
//! | `bri`        | `brightness`  | Also `state` when `on` is absent          |
//! | `on`         | `state`       | Wins over the `bri`-derived state         |
//! | climate, ambient, colour fields | same name |                      |
//!
//! Configuration fields map `battery`, `reachable`, `on` (as `state`) and
//! `temperature`.

mod normalize;
mod signal;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};

pub use normalize::{Staleness, normalize_value, parse_timestamp, staleness};
pub use signal::{NormalizedSignal, PublishMode};

use crate::config::BridgeConfig;
use crate::event::{ChangeEvent, Origin};
use crate::protocol::{MessageBus, SignalPublisher};
use crate::state::{DeviceCache, ResourceType};
use normalize::{as_number, bool_flag};

/// Model id of the hub's built-in daylight pseudo-sensor.
const DAYLIGHT_MODEL_ID: &str = "PHDL00";
/// Manufacturer of the hub's built-in daylight pseudo-sensor.
const DAYLIGHT_MANUFACTURER: &str = "Philips";

/// State fields published under their own name.
const PASSTHROUGH_FIELDS: &[&str] = &[
    "temperature",
    "humidity",
    "pressure",
    "lux",
    "dark",
    "daylight",
    "lightlevel",
    "presence",
    "effect",
    "sat",
    "xy",
    "hue",
    "alert",
    "ct",
    "water",
];

/// Converts device changes into signals and publishes them.
#[derive(Debug)]
pub struct EventTranslator<B> {
    topic_prefix: String,
    retain: bool,
    time_zone: Tz,
    stale_after: TimeDelta,
    cache: Arc<DeviceCache>,
    publisher: SignalPublisher<B>,
}

impl<B: MessageBus> EventTranslator<B> {
    /// Creates a translator publishing to `bus`.
    pub fn new(config: &BridgeConfig, cache: Arc<DeviceCache>, bus: B) -> Self {
        let stale_after =
            TimeDelta::from_std(config.stale_after()).unwrap_or_else(|_| TimeDelta::hours(4));

        Self {
            topic_prefix: config.topic_prefix().to_string(),
            retain: config.retain(),
            time_zone: config.time_zone(),
            stale_after,
            cache,
            publisher: SignalPublisher::new(bus),
        }
    }

    /// Returns the device cache used for name resolution.
    pub fn cache(&self) -> &Arc<DeviceCache> {
        &self.cache
    }

    /// Returns the publisher.
    pub fn publisher(&self) -> &SignalPublisher<B> {
        &self.publisher
    }

    /// Translates a change and publishes the resulting signals.
    ///
    /// Returns the number of signals handed to the bus.
    pub fn handle(&self, origin: Origin, change: &ChangeEvent) -> usize {
        let signals = self.translate(origin, change, Utc::now());
        self.publisher.publish_all(&signals)
    }

    /// Translates a change into signals without publishing.
    ///
    /// `now` is the reference time for the staleness check.
    pub fn translate(
        &self,
        origin: Origin,
        change: &ChangeEvent,
        now: DateTime<Utc>,
    ) -> Vec<NormalizedSignal> {
        let Some(resource) = change.resource.as_deref() else {
            tracing::error!(id = ?change.id, "Dropping change without resource type");
            return Vec::new();
        };
        let Some(id) = change.id.as_deref() else {
            tracing::error!(resource = %resource, "Dropping change without device id");
            return Vec::new();
        };

        if is_daylight_sensor(resource, change) {
            tracing::trace!(id = %id, "Skipping daylight pseudo-sensor");
            return Vec::new();
        }

        let name = ResourceType::parse(resource).map_or_else(
            || id.to_string(),
            |resource| self.cache.resolve_name(resource, id),
        );
        let mut out = SignalSet::new(
            format!("{}/{resource}/{name}", self.topic_prefix),
            self.retain,
        );

        let mut reachability_inferred = false;

        if let Some(state) = &change.state {
            if let Some(lastupdated) = state
                .get("lastupdated")
                .and_then(Value::as_str)
                .filter(|raw| *raw != "none")
            {
                out.push("lastupdated", lastupdated);
                reachability_inferred = true;

                match staleness(lastupdated, now, self.time_zone, self.stale_after) {
                    Staleness::Stale => {
                        tracing::warn!(device = %name, lastupdated, "Device not reachable");
                        out.push("reachable", "0");
                        return out.into_signals();
                    }
                    Staleness::Fresh => out.push("reachable", "1"),
                    Staleness::Unknown => {
                        tracing::debug!(device = %name, lastupdated, "Unreadable lastupdated");
                        out.push("reachable", "1");
                    }
                }
            }

            state_signals(origin, state, &mut out);
        }

        if let Some(config) = &change.config {
            config_signals(config, reachability_inferred, &mut out);
        }

        out.into_signals()
    }
}

fn is_daylight_sensor(resource: &str, change: &ChangeEvent) -> bool {
    resource == ResourceType::Sensors.as_str()
        && change.modelid.as_deref() == Some(DAYLIGHT_MODEL_ID)
        && change.manufacturer.as_deref() == Some(DAYLIGHT_MANUFACTURER)
}

fn state_signals(origin: Origin, state: &Map<String, Value>, out: &mut SignalSet) {
    if let Some(event) = state.get("buttonevent")
        && !origin.is_query()
    {
        out.push_momentary("buttonevent", normalize_value("buttonevent", event));
    }

    if let Some(open) = state.get("open") {
        out.push("contact", normalize_value("open", open));
    }

    let on = state.get("on");

    if let Some(bri) = state.get("bri") {
        out.push("brightness", normalize_value("bri", bri));

        if on.is_none() {
            let lit = as_number(bri).is_some_and(|level| level > 0.0);
            out.push("state", bool_flag(lit));
        }
    }

    if let Some(on) = on {
        out.push("state", normalize_value("on", on));
    }

    for field in PASSTHROUGH_FIELDS {
        if let Some(value) = state.get(*field) {
            out.push(field, normalize_value(field, value));
        }
    }
}

fn config_signals(config: &Map<String, Value>, reachability_inferred: bool, out: &mut SignalSet) {
    if let Some(battery) = config.get("battery") {
        out.push("battery", normalize_value("battery", battery));
    }

    if !reachability_inferred && let Some(reachable) = config.get("reachable") {
        out.push("reachable", normalize_value("reachable", reachable));
    }

    if !out.has("state")
        && let Some(on) = config.get("on")
    {
        out.push("state", normalize_value("on", on));
    }

    if !out.has("temperature")
        && let Some(temperature) = config.get("temperature")
    {
        out.push("temperature", normalize_value("temperature", temperature));
    }
}

/// Signals being collected for one device.
struct SignalSet {
    prefix: String,
    retain: bool,
    signals: Vec<NormalizedSignal>,
}

impl SignalSet {
    fn new(prefix: String, retain: bool) -> Self {
        Self {
            prefix,
            retain,
            signals: Vec::new(),
        }
    }

    fn push(&mut self, field: &str, value: impl Into<String>) {
        self.signals.push(NormalizedSignal {
            topic: format!("{}/{field}", self.prefix),
            value: value.into(),
            retain: self.retain,
            mode: PublishMode::OnChange,
        });
    }

    fn push_momentary(&mut self, field: &str, value: impl Into<String>) {
        self.signals.push(NormalizedSignal {
            topic: format!("{}/{field}", self.prefix),
            value: value.into(),
            retain: false,
            mode: PublishMode::Always,
        });
    }

    fn has(&self, field: &str) -> bool {
        self.signals.iter().any(|s| s.field() == field)
    }

    fn into_signals(self) -> Vec<NormalizedSignal> {
        self.signals
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::error::ProtocolError;
    use crate::state::DeviceSnapshot;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String, bool)>>,
    }

    impl MessageBus for Recorder {
        fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError> {
            self.sent
                .lock()
                .push((topic.to_string(), payload.to_string(), retain));
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn translator() -> EventTranslator<Recorder> {
        let cache = Arc::new(DeviceCache::new());
        cache.replace(
            DeviceSnapshot::from_json(
                ResourceType::Lights,
                json!({"7": {"name": "Lamp"}, "3": {"name": "Kitchen Light"}}),
            )
            .unwrap(),
        );
        cache.replace(
            DeviceSnapshot::from_json(
                ResourceType::Sensors,
                json!({"12": {"name": "Hall Motion"}}),
            )
            .unwrap(),
        );
        let config = BridgeConfig::new("127.0.0.1", "/deconz").with_retain(true);
        EventTranslator::new(&config, cache, Recorder::default())
    }

    fn change(value: serde_json::Value) -> ChangeEvent {
        serde_json::from_value(value).unwrap()
    }

    fn pairs(signals: &[NormalizedSignal]) -> Vec<(&str, &str)> {
        signals
            .iter()
            .map(|s| (s.topic.as_str(), s.value.as_str()))
            .collect()
    }

    #[test]
    fn brightness_derives_state() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "lights", "id": "7", "state": {"bri": 128}})),
            now(),
        );
        assert_eq!(
            pairs(&signals),
            [
                ("/deconz/lights/lamp/brightness", "128"),
                ("/deconz/lights/lamp/state", "1"),
            ]
        );
        assert!(signals.iter().all(|s| s.retain));
    }

    #[test]
    fn zero_brightness_is_off() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "lights", "id": "7", "state": {"bri": 0}})),
            now(),
        );
        assert!(pairs(&signals).contains(&("/deconz/lights/lamp/state", "0")));
    }

    #[test]
    fn explicit_on_wins_over_brightness() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "lights", "id": "7", "state": {"bri": 0, "on": true}})),
            now(),
        );
        let states: Vec<_> = signals.iter().filter(|s| s.field() == "state").collect();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].value, "1");
    }

    #[test]
    fn unknown_device_uses_id() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "lights", "id": "99", "state": {"on": false}})),
            now(),
        );
        assert_eq!(pairs(&signals), [("/deconz/lights/99/state", "0")]);
    }

    #[test]
    fn missing_resource_or_id_is_dropped() {
        let t = translator();
        assert!(
            t.translate(Origin::Live, &change(json!({"id": "7", "state": {"on": true}})), now())
                .is_empty()
        );
        assert!(
            t.translate(Origin::Live, &change(json!({"r": "lights", "state": {"on": true}})), now())
                .is_empty()
        );
    }

    #[test]
    fn daylight_sensor_is_skipped() {
        let t = translator();
        let signals = t.translate(
            Origin::Query,
            &change(json!({
                "r": "sensors", "id": "1",
                "modelid": "PHDL00", "manufacturername": "Philips",
                "state": {"daylight": true, "status": 170}
            })),
            now(),
        );
        assert!(signals.is_empty());
    }

    #[test]
    fn stale_device_only_reports_unreachable() {
        let t = translator();
        let signals = t.translate(
            Origin::Query,
            &change(json!({
                "r": "sensors", "id": "12",
                "state": {"presence": true, "lastupdated": "2024-03-01T07:00:00"},
                "config": {"battery": 90, "reachable": true}
            })),
            now(),
        );
        assert_eq!(
            pairs(&signals),
            [
                ("/deconz/sensors/hall_motion/lastupdated", "2024-03-01T07:00:00"),
                ("/deconz/sensors/hall_motion/reachable", "0"),
            ]
        );
    }

    #[test]
    fn fresh_device_reports_reachable_and_fields() {
        let t = translator();
        let signals = t.translate(
            Origin::Query,
            &change(json!({
                "r": "sensors", "id": "12",
                "state": {"presence": true, "lastupdated": "2024-03-01T11:59:00"},
                "config": {"battery": 90, "reachable": false, "on": true}
            })),
            now(),
        );
        assert_eq!(
            pairs(&signals),
            [
                ("/deconz/sensors/hall_motion/lastupdated", "2024-03-01T11:59:00"),
                ("/deconz/sensors/hall_motion/reachable", "1"),
                ("/deconz/sensors/hall_motion/presence", "1"),
                ("/deconz/sensors/hall_motion/battery", "90"),
                ("/deconz/sensors/hall_motion/state", "1"),
            ]
        );
    }

    #[test]
    fn lastupdated_none_skips_inference() {
        let t = translator();
        let signals = t.translate(
            Origin::Query,
            &change(json!({
                "r": "sensors", "id": "12",
                "state": {"lastupdated": "none"},
                "config": {"reachable": true}
            })),
            now(),
        );
        assert_eq!(
            pairs(&signals),
            [("/deconz/sensors/hall_motion/reachable", "1")]
        );
    }

    #[test]
    fn climate_values_are_scaled() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({
                "r": "sensors", "id": "20",
                "state": {"temperature": 2150, "humidity": 4312, "pressure": 1008}
            })),
            now(),
        );
        assert_eq!(
            pairs(&signals),
            [
                ("/deconz/sensors/20/temperature", "21.50"),
                ("/deconz/sensors/20/humidity", "43.12"),
                ("/deconz/sensors/20/pressure", "1008"),
            ]
        );
    }

    #[test]
    fn config_temperature_only_without_state_temperature() {
        let t = translator();
        let with_state = t.translate(
            Origin::Live,
            &change(json!({
                "r": "sensors", "id": "20",
                "state": {"temperature": 2150},
                "config": {"temperature": 3300}
            })),
            now(),
        );
        assert_eq!(pairs(&with_state), [("/deconz/sensors/20/temperature", "21.50")]);

        let config_only = t.translate(
            Origin::Live,
            &change(json!({"r": "sensors", "id": "20", "config": {"temperature": 3300}})),
            now(),
        );
        assert_eq!(pairs(&config_only), [("/deconz/sensors/20/temperature", "33.00")]);
    }

    #[test]
    fn open_maps_to_contact() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "sensors", "id": "30", "state": {"open": "true"}})),
            now(),
        );
        assert_eq!(pairs(&signals), [("/deconz/sensors/30/contact", "1")]);
    }

    #[test]
    fn button_event_only_for_live_changes() {
        let t = translator();
        let payload = json!({"r": "sensors", "id": "40", "state": {"buttonevent": 1002}});

        let live = t.translate(Origin::Live, &change(payload.clone()), now());
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].topic, "/deconz/sensors/40/buttonevent");
        assert_eq!(live[0].value, "1002");
        assert!(!live[0].retain);
        assert_eq!(live[0].mode, PublishMode::Always);

        let query = t.translate(Origin::Query, &change(payload), now());
        assert!(query.is_empty());
    }

    #[test]
    fn unrecognized_fields_are_not_published() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "lights", "id": "7", "state": {"colormode": "xy", "xy": [0.3, 0.4]}})),
            now(),
        );
        assert_eq!(pairs(&signals), [("/deconz/lights/lamp/xy", "0.3,0.4")]);
    }

    #[test]
    fn other_resources_use_raw_id() {
        let t = translator();
        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "groups", "id": "7", "state": {"any_on": true}})),
            now(),
        );
        assert!(signals.is_empty());

        let signals = t.translate(
            Origin::Live,
            &change(json!({"r": "groups", "id": "7", "state": {"on": true}})),
            now(),
        );
        assert_eq!(pairs(&signals), [("/deconz/groups/7/state", "1")]);
    }

    #[test]
    fn handle_publishes_once_per_change() {
        let t = translator();
        let event = change(json!({"r": "lights", "id": "3", "state": {"on": true}}));

        assert_eq!(t.handle(Origin::Live, &event), 1);
        assert_eq!(t.handle(Origin::Live, &event), 0);

        let sent = t.publisher().bus().sent.lock();
        assert_eq!(
            *sent,
            [("/deconz/lights/kitchen_light/state".to_string(), "1".to_string(), true)]
        );
    }

    #[test]
    fn button_events_always_publish() {
        let t = translator();
        let event = change(json!({"r": "sensors", "id": "40", "state": {"buttonevent": 2002}}));

        assert_eq!(t.handle(Origin::Live, &event), 1);
        assert_eq!(t.handle(Origin::Live, &event), 1);
    }
}
