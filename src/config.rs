// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.
//!
//! Configuration is read from environment variables at startup:
//!
//! | Variable       | Meaning                                  | Default          |
//! |----------------|------------------------------------------|------------------|
//! | `DECONZ_IP`    | Hub address (`host` or `host:port`)      | required         |
//! | `DECONZ_PORT`  | Push feed port                           | `443`            |
//! | `TOPIC_PREFIX` | Bus topic prefix                         | required         |
//! | `MQTT_RETAIN`  | Retain state signals (`true`/`1`/`yes`)  | `false`          |
//! | `TIMEZONE`     | IANA zone for staleness checks (or `TZ`) | system zone      |
//! | `MQTT_HOST`    | Broker URL (`mqtt://host:port`)          | `localhost:1883` |
//! | `MQTT_USER`    | Broker username                          | none             |
//! | `MQTT_PASS`    | Broker password                          | none             |
//!
//! A zone that is not a known IANA name (a POSIX rule string, a path) is
//! logged and replaced by the system zone, or UTC when that is unknown.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//! use deconz_bridge::BridgeConfig;
//!
//! let vars = HashMap::from([
//!     ("DECONZ_IP", "192.168.1.20"),
//!     ("DECONZ_PORT", "8088"),
//!     ("TOPIC_PREFIX", "/deconz"),
//! ]);
//!
//! let config = BridgeConfig::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap();
//! assert_eq!(config.feed_url(), "ws://192.168.1.20:8088");
//! ```

use std::time::Duration;

use chrono_tz::Tz;

use crate::error::ConfigError;

/// Settings for the MQTT broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Optional username and password.
    pub credentials: Option<(String, String)>,
    /// Keep-alive interval.
    pub keep_alive: Duration,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    hub_host: String,
    feed_port: u16,
    topic_prefix: String,
    retain: bool,
    time_zone: Tz,
    mqtt: MqttSettings,
    poll_interval: Duration,
    reconnect_delay: Duration,
    stale_after: Duration,
}

impl BridgeConfig {
    /// Default push feed port.
    pub const DEFAULT_FEED_PORT: u16 = 443;
    /// Default full-snapshot poll period.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
    /// Default delay before a feed reconnect attempt.
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(30);
    /// Default age after which a device is reported unreachable.
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(4 * 60 * 60);

    /// Creates a configuration with defaults for everything but the hub
    /// address and topic prefix.
    #[must_use]
    pub fn new(hub_host: impl Into<String>, topic_prefix: impl Into<String>) -> Self {
        Self {
            hub_host: hub_host.into(),
            feed_port: Self::DEFAULT_FEED_PORT,
            topic_prefix: topic_prefix.into(),
            retain: false,
            time_zone: Tz::UTC,
            mqtt: MqttSettings::default(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            stale_after: Self::DEFAULT_STALE_AFTER,
        }
    }

    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// Without a zone override the system zone is used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let hub_host = var("DECONZ_IP").ok_or(ConfigError::MissingVariable("DECONZ_IP"))?;
        let topic_prefix =
            var("TOPIC_PREFIX").ok_or(ConfigError::MissingVariable("TOPIC_PREFIX"))?;

        let mut config = Self::new(hub_host, topic_prefix);

        if let Some(port) = var("DECONZ_PORT") {
            config.feed_port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "DECONZ_PORT",
                value: port.clone(),
            })?;
        }

        if let Some(retain) = var("MQTT_RETAIN") {
            config.retain = parse_flag(&retain);
        }

        config.time_zone = resolve_time_zone(var("TIMEZONE").or_else(|| var("TZ")).as_deref());

        if let Some(url) = var("MQTT_HOST") {
            let (host, port) = parse_broker_url(&url)?;
            config.mqtt.host = host;
            config.mqtt.port = port;
        }

        if let Some(user) = var("MQTT_USER") {
            let pass = var("MQTT_PASS").unwrap_or_default();
            config.mqtt.credentials = Some((user, pass));
        }

        Ok(config)
    }

    /// Sets the push feed port.
    #[must_use]
    pub fn with_feed_port(mut self, port: u16) -> Self {
        self.feed_port = port;
        self
    }

    /// Enables or disables retain for state signals.
    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Sets the time zone used for staleness checks.
    #[must_use]
    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// Sets the MQTT broker settings.
    #[must_use]
    pub fn with_mqtt(mut self, mqtt: MqttSettings) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Sets the full-snapshot poll period.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the delay before a feed reconnect attempt.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the age after which a device is reported unreachable.
    #[must_use]
    pub fn with_stale_after(mut self, age: Duration) -> Self {
        self.stale_after = age;
        self
    }

    /// Returns the hub address.
    #[must_use]
    pub fn hub_host(&self) -> &str {
        &self.hub_host
    }

    /// Returns the push feed port.
    #[must_use]
    pub fn feed_port(&self) -> u16 {
        self.feed_port
    }

    /// Returns the bus topic prefix.
    #[must_use]
    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    /// Returns whether state signals are retained.
    #[must_use]
    pub fn retain(&self) -> bool {
        self.retain
    }

    /// Returns the time zone used for staleness checks.
    #[must_use]
    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Returns the MQTT broker settings.
    #[must_use]
    pub fn mqtt(&self) -> &MqttSettings {
        &self.mqtt
    }

    /// Returns the full-snapshot poll period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the delay before a feed reconnect attempt.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Returns the age after which a device is reported unreachable.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Returns the base URL of the hub REST API.
    #[must_use]
    pub fn hub_base_url(&self) -> String {
        if self.hub_host.starts_with("http://") || self.hub_host.starts_with("https://") {
            self.hub_host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.hub_host)
        }
    }

    /// Returns the URL of the push feed.
    #[must_use]
    pub fn feed_url(&self) -> String {
        let host = self
            .hub_host
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        // Drop any REST port; the feed has its own.
        let host = host.split_once(':').map_or(host, |(h, _)| h);
        format!("ws://{host}:{}", self.feed_port)
    }

    /// Returns the inbound command subscription pattern.
    #[must_use]
    pub fn command_filter(&self) -> String {
        format!("{}/lights/+/+/set", self.topic_prefix)
    }
}

/// Picks the zone override if it names an IANA zone, else the system zone,
/// else UTC.
fn resolve_time_zone(configured: Option<&str>) -> Tz {
    if let Some(raw) = configured {
        // TZ may carry a leading ':' per POSIX
        match raw.trim().trim_start_matches(':').parse::<Tz>() {
            Ok(zone) => return zone,
            Err(_) => {
                tracing::warn!(value = %raw, "Unknown time zone, using the system zone");
            }
        }
    }
    system_time_zone().unwrap_or(Tz::UTC)
}

fn system_time_zone() -> Option<Tz> {
    match iana_time_zone::get_timezone() {
        Ok(name) => name.parse().ok(),
        Err(e) => {
            tracing::debug!(error = %e, "System time zone unavailable");
            None
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Parses a broker URL into host and port.
///
/// Accepts `mqtt://host:port`, `tcp://host:port`, or a bare `host[:port]`.
fn parse_broker_url(url: &str) -> Result<(String, u16), ConfigError> {
    let stripped = url
        .trim()
        .strip_prefix("mqtt://")
        .or_else(|| url.trim().strip_prefix("tcp://"))
        .unwrap_or(url.trim())
        .trim_end_matches('/');

    let (host, port) = if let Some((h, p)) = stripped.rsplit_once(':') {
        let port = p.parse().map_err(|_| ConfigError::InvalidValue {
            name: "MQTT_HOST",
            value: url.to_string(),
        })?;
        (h.to_string(), port)
    } else {
        (stripped.to_string(), 1883)
    };

    if host.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "MQTT_HOST",
            value: url.to_string(),
        });
    }

    Ok((host, port))
}
