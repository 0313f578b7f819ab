// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wiring of the bridge components.
//!
//! ```text
//!   hub feed ──▶ FeedManager ──┐
//!                              ├──▶ EventTranslator ──▶ MessageBus
//!   hub REST ──▶ Poller ───────┘          │
//!       ▲          │ (replace)            ▼
//!       │          └──────────────▶ DeviceCache
//!       │                                 ▲
//!       └──── CommandRouter ◀── bus ──────┘ (resolve names)
//! ```

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::command::CommandRouter;
use crate::config::BridgeConfig;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::pairing::{PairingManager, PairingOutcome};
use crate::poller::Poller;
use crate::protocol::{
    BusEvent, ConnectionState, FeedHandle, FeedManager, HubClient, MessageBus, MqttBus,
};
use crate::state::DeviceCache;
use crate::translate::EventTranslator;

/// The hub-to-bus bridge.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use deconz_bridge::bridge::Bridge;
/// use deconz_bridge::config::BridgeConfig;
/// use deconz_bridge::credentials::FileCredentialStore;
///
/// # async fn example() -> deconz_bridge::Result<()> {
/// let config = BridgeConfig::from_env()?;
/// let store = Arc::new(FileCredentialStore::default_location()?);
///
/// Bridge::new(config, store).run().await
/// # }
/// ```
pub struct Bridge {
    config: BridgeConfig,
    store: Arc<dyn CredentialStore>,
}

impl Bridge {
    /// Creates a bridge.
    pub fn new(config: BridgeConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self { config, store }
    }

    /// Connects to the MQTT broker and runs until the bus connection task
    /// ends.
    ///
    /// # Errors
    ///
    /// Returns error if the hub address or broker settings are unusable.
    pub async fn run(self) -> Result<()> {
        let (bus, events) = MqttBus::builder()
            .settings(self.config.mqtt().clone())
            .subscribe_on_connect(self.config.command_filter())
            .build()?;

        self.start(bus, events).await?.wait().await;
        Ok(())
    }

    /// Pairs with the hub and starts every task on the given bus.
    ///
    /// `events` must deliver the bus's connection events and the messages
    /// received on the command filter.
    ///
    /// # Errors
    ///
    /// Returns error if the hub address is unusable.
    pub async fn start<B>(
        self,
        bus: B,
        events: mpsc::Receiver<BusEvent>,
    ) -> Result<RunningBridge>
    where
        B: MessageBus + 'static,
    {
        let config = self.config;
        let hub = HubClient::new(config.hub_base_url())?;

        let pairing = PairingManager::new(hub.clone(), self.store)
            .ensure_paired()
            .await;
        if !pairing.is_paired() {
            tracing::warn!("Running without API key, polling and commands are disabled");
        }

        let cache = Arc::new(DeviceCache::new());
        let translator = Arc::new(EventTranslator::new(&config, Arc::clone(&cache), bus));

        let poller = Poller::new(hub.clone(), Arc::clone(&translator), config.poll_interval());
        let resync = poller.resync_handle();
        let poll_task = poller.spawn();

        let feed = FeedManager::new(
            config.feed_url(),
            config.reconnect_delay(),
            translator,
            Arc::clone(&resync),
        )
        .spawn();

        let router = CommandRouter::new(config.topic_prefix(), hub.clone(), Arc::clone(&cache));
        let bus_task = tokio::spawn(route_bus_events(events, router, resync));

        tracing::info!(
            hub = %hub.base_url(),
            feed = %config.feed_url(),
            prefix = %config.topic_prefix(),
            "Bridge started"
        );

        Ok(RunningBridge {
            pairing,
            cache,
            feed,
            poll_task,
            bus_task,
        })
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("hub", &self.config.hub_host())
            .field("prefix", &self.config.topic_prefix())
            .finish_non_exhaustive()
    }
}

/// Handle to the running bridge tasks.
#[derive(Debug)]
pub struct RunningBridge {
    pairing: PairingOutcome,
    cache: Arc<DeviceCache>,
    feed: FeedHandle,
    poll_task: JoinHandle<()>,
    bus_task: JoinHandle<()>,
}

impl RunningBridge {
    /// Returns how the API key was obtained.
    #[must_use]
    pub fn pairing(&self) -> PairingOutcome {
        self.pairing
    }

    /// Returns the device cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<DeviceCache> {
        &self.cache
    }

    /// Returns the feed connection state.
    #[must_use]
    pub fn feed_state(&self) -> ConnectionState {
        self.feed.state()
    }

    /// Waits for the bus event stream to end, then stops the other tasks.
    pub async fn wait(self) {
        if let Err(e) = self.bus_task.await {
            tracing::error!(error = %e, "Bus task failed");
        }
        self.feed.abort();
        self.poll_task.abort();
    }

    /// Stops every task.
    pub fn shutdown(&self) {
        self.bus_task.abort();
        self.feed.abort();
        self.poll_task.abort();
    }
}

/// Reacts to bus connection events and dispatches inbound commands.
async fn route_bus_events(
    mut events: mpsc::Receiver<BusEvent>,
    router: CommandRouter,
    resync: Arc<Notify>,
) {
    while let Some(event) = events.recv().await {
        match event {
            BusEvent::Connected => {
                tracing::info!("Message bus connected, requesting resync");
                resync.notify_one();
            }
            BusEvent::Disconnected => {
                tracing::warn!("Message bus disconnected");
            }
            BusEvent::Message { topic, payload } => {
                let router = router.clone();
                // Commands may overlap with each other and with polling.
                tokio::spawn(async move {
                    router.handle(&topic, &payload).await;
                });
            }
        }
    }

    tracing::debug!("Bus event stream ended");
}
