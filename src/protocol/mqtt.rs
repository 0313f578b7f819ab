// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT message bus connection.
//!
//! [`MqttBus`] owns the broker connection. Outbound publishes are queued
//! without waiting; inbound traffic and connection events are delivered to
//! the caller as [`BusEvent`]s over a channel.
//!
//! # Examples
//!
//! ```no_run
//! use deconz_bridge::config::MqttSettings;
//! use deconz_bridge::protocol::{BusEvent, MessageBus, MqttBus};
//!
//! # async fn example() -> deconz_bridge::Result<()> {
//! let (bus, mut events) = MqttBus::builder()
//!     .settings(MqttSettings::default())
//!     .subscribe_on_connect("/deconz/lights/+/+/set")
//!     .build()?;
//!
//! bus.publish("/deconz/lights/lamp/state", "1", false)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let BusEvent::Message { topic, payload } = event {
//!         println!("{topic}: {payload}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::mpsc;

use crate::config::MqttSettings;
use crate::error::ProtocolError;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Pause after an event loop error before polling again.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Publish side of a message bus.
pub trait MessageBus: Send + Sync {
    /// Queues a message for publishing at QoS 1.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message cannot be queued.
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError>;
}

impl<T: MessageBus + ?Sized> MessageBus for Arc<T> {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError> {
        (**self).publish(topic, payload, retain)
    }
}

/// Something that happened on the bus connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The broker accepted the connection (initially or after a reconnect).
    Connected,
    /// The connection dropped; the client keeps retrying.
    Disconnected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// UTF-8 payload.
        payload: String,
    },
}

/// An MQTT broker connection.
///
/// Cheaply cloneable; clones share the connection.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttBus {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MqttBusBuilder {
        MqttBusBuilder::default()
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl MessageBus for MqttBus {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError> {
        tracing::trace!(topic = %topic, payload = %payload, retain, "Queueing MQTT publish");
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload.as_bytes().to_vec())
            .map_err(ProtocolError::Mqtt)
    }
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Builder for [`MqttBus`].
#[derive(Debug, Default)]
pub struct MqttBusBuilder {
    settings: MqttSettings,
    subscriptions: Vec<String>,
}

impl MqttBusBuilder {
    /// Sets the broker settings.
    #[must_use]
    pub fn settings(mut self, settings: MqttSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds a topic filter that is (re)subscribed on every connection.
    #[must_use]
    pub fn subscribe_on_connect(mut self, filter: impl Into<String>) -> Self {
        self.subscriptions.push(filter.into());
        self
    }

    /// Starts the connection.
    ///
    /// The connection is established in the background; the returned
    /// receiver yields [`BusEvent::Connected`] once the broker accepts it.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the broker host is not set.
    pub fn build(self) -> Result<(MqttBus, mpsc::Receiver<BusEvent>), ProtocolError> {
        if self.settings.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("deconz_bridge_{}_{}", std::process::id(), counter);

        let mut options = MqttOptions::new(&client_id, &self.settings.host, self.settings.port);
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.settings.credentials {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        let bus = MqttBus {
            client,
            connected: Arc::new(AtomicBool::new(false)),
        };

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            host = %self.settings.host,
            port = self.settings.port,
            "Connecting to MQTT broker"
        );

        let loop_bus = bus.clone();
        tokio::spawn(async move {
            handle_bus_events(event_loop, loop_bus, self.subscriptions, event_tx).await;
        });

        Ok((bus, event_rx))
    }
}

/// Drives the MQTT event loop for the life of the process.
async fn handle_bus_events(
    mut event_loop: EventLoop,
    bus: MqttBus,
    subscriptions: Vec<String>,
    event_tx: mpsc::Sender<BusEvent>,
) {
    use rumqttc::{Event, Packet};

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::info!(?connack, "Connected to MQTT broker");
                bus.connected.store(true, Ordering::Release);

                for filter in &subscriptions {
                    if let Err(e) = bus.client.try_subscribe(filter, QoS::AtLeastOnce) {
                        tracing::error!(filter = %filter, error = %e, "Failed to subscribe");
                    } else {
                        tracing::debug!(filter = %filter, "Subscribed");
                    }
                }

                if event_tx.send(BusEvent::Connected).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Ok(payload) = String::from_utf8(publish.payload.to_vec()) else {
                    tracing::warn!(topic = %publish.topic, "Dropping non UTF-8 MQTT payload");
                    continue;
                };
                tracing::debug!(topic = %publish.topic, payload = %payload, "MQTT message received");

                let event = BusEvent::Message {
                    topic: publish.topic,
                    payload,
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                bus.connected.store(false, Ordering::Release);
                let _ = event_tx.send(BusEvent::Disconnected).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT event loop error");
                if bus.connected.swap(false, Ordering::AcqRel) {
                    let _ = event_tx.send(BusEvent::Disconnected).await;
                }
                // The next poll reconnects.
                tokio::time::sleep(RETRY_PAUSE).await;
            }
        }
    }

    tracing::debug!("MQTT event loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_subscriptions() {
        let builder = MqttBus::builder()
            .subscribe_on_connect("a/+/set")
            .subscribe_on_connect("b/#");
        assert_eq!(builder.subscriptions, ["a/+/set", "b/#"]);
        assert_eq!(builder.settings.port, 1883);
    }

    #[tokio::test]
    async fn missing_host_fails() {
        let settings = MqttSettings {
            host: String::new(),
            ..MqttSettings::default()
        };
        let result = MqttBus::builder().settings(settings).build();
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn publish_is_queued_without_connection() {
        let (bus, _events) = MqttBus::builder().build().unwrap();
        assert!(!bus.is_connected());
        bus.publish("/deconz/lights/lamp/state", "1", false).unwrap();
    }
}
