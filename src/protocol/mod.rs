// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transports between the hub and the message bus.
//!
//! - [`HubClient`]: the hub REST API (polling, commands, pairing)
//! - [`FeedManager`]: the hub push feed over WebSocket
//! - [`MqttBus`]: the MQTT broker connection
//! - [`SignalPublisher`]: change-filtered publishing on any [`MessageBus`]

mod feed;
mod http;
mod mqtt;
mod publisher;

pub use feed::{
    ConnectionState, FeedAction, FeedEvent, FeedHandle, FeedManager, FeedStateMachine,
};
pub use http::{HubClient, LightStateUpdate};
pub use mqtt::{BusEvent, MessageBus, MqttBus, MqttBusBuilder};
pub use publisher::SignalPublisher;
