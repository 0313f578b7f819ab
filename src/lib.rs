// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `deCONZ` Bridge - mirror a deCONZ hub onto an MQTT bus.
//!
//! The bridge keeps MQTT topics in step with the lights and sensors of a
//! deCONZ hub and turns MQTT commands back into hub API calls.
//!
//! # Data Flow
//!
//! - **Push feed**: live changes from the hub WebSocket, reconnected after a
//!   fixed delay when it drops
//! - **Polling**: a full REST resync every 15 seconds and whenever the feed
//!   or the bus (re)connects
//! - **Translation**: each device change becomes one signal per known
//!   field, published only when its value changed
//! - **Commands**: `{prefix}/lights/{device}/{action}/set` becomes a light
//!   state request
//!
//! # Topics
//!
//! | Direction | Topic                                      | Example payload |
//! |-----------|--------------------------------------------|-----------------|
//! | Out       | `{prefix}/lights/{name}/brightness`        | `128`           |
//! | Out       | `{prefix}/sensors/{name}/temperature`      | `21.50`         |
//! | Out       | `{prefix}/sensors/{name}/reachable`        | `1`             |
//! | In        | `{prefix}/lights/{name or id}/state/set`   | `0`             |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use deconz_bridge::{Bridge, BridgeConfig};
//! use deconz_bridge::credentials::FileCredentialStore;
//!
//! #[tokio::main]
//! async fn main() -> deconz_bridge::Result<()> {
//!     let config = BridgeConfig::new("192.168.1.20", "/deconz")
//!         .with_feed_port(8088)
//!         .with_retain(true);
//!     let store = Arc::new(FileCredentialStore::default_location()?);
//!
//!     Bridge::new(config, store).run().await
//! }
//! ```
//!
//! # Pairing
//!
//! On first start no API key is stored. Press the link button on the hub
//! (or unlock the gateway in the Phoscon app) before starting the bridge;
//! it registers once and stores the key for later runs.

pub mod bridge;
pub mod command;
pub mod config;
pub mod credentials;
pub mod error;
pub mod event;
pub mod pairing;
pub mod poller;
pub mod protocol;
pub mod state;
pub mod translate;

pub use bridge::{Bridge, RunningBridge};
pub use command::{CommandOutcome, CommandRouter, LightCommand};
pub use config::{BridgeConfig, MqttSettings};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ConfigError, CredentialError, Error, ParseError, ProtocolError, Result};
pub use event::{ChangeEvent, FeedMessage, Origin};
pub use pairing::{PairingManager, PairingOutcome};
pub use poller::Poller;
pub use protocol::{BusEvent, HubClient, MessageBus, MqttBus};
pub use state::{DeviceCache, DeviceId, DeviceRecord, DeviceSnapshot, ResourceType};
pub use translate::{EventTranslator, NormalizedSignal, PublishMode};
