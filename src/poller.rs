// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic full resync from the hub REST API.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::event::{ChangeEvent, Origin};
use crate::protocol::{HubClient, MessageBus};
use crate::state::ResourceType;
use crate::translate::EventTranslator;

/// Resource types fetched on every cycle, in order.
const POLLED_RESOURCES: [ResourceType; 2] = [ResourceType::Lights, ResourceType::Sensors];

/// Fetches full snapshots on a fixed period and replays them through the
/// translator.
///
/// The poller is the only writer of device snapshots. Besides its own
/// ticks it runs a cycle whenever its resync handle is notified.
pub struct Poller<B> {
    hub: HubClient,
    translator: Arc<EventTranslator<B>>,
    interval: Duration,
    resync: Arc<Notify>,
}

impl<B: MessageBus + 'static> Poller<B> {
    /// Creates a poller with the given period.
    pub fn new(hub: HubClient, translator: Arc<EventTranslator<B>>, interval: Duration) -> Self {
        Self {
            hub,
            translator,
            interval,
            resync: Arc::new(Notify::new()),
        }
    }

    /// Returns the handle other components notify to request an
    /// immediate cycle.
    #[must_use]
    pub fn resync_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.resync)
    }

    /// Runs the poll loop on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Polls immediately, then every interval, for the life of the task.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.resync.notified() => {
                    tracing::debug!("Resync requested");
                }
            }
            self.poll_once().await;
        }
    }

    /// Runs one poll cycle and returns the number of signals published.
    ///
    /// A failed fetch keeps the previous snapshot; the next cycle is the
    /// retry.
    pub async fn poll_once(&self) -> usize {
        if !self.hub.has_api_key() {
            tracing::debug!("Not paired, skipping poll");
            return 0;
        }

        let mut published = 0;
        for resource in POLLED_RESOURCES {
            let snapshot = match self.hub.fetch_snapshot(resource).await {
                Ok(snapshot) => self.translator.cache().replace(snapshot),
                Err(e) => {
                    tracing::warn!(resource = %resource, error = %e, "Poll failed");
                    continue;
                }
            };

            for (id, record) in snapshot.iter() {
                let change = ChangeEvent::from_record(resource, id, record);
                published += self.translator.handle(Origin::Query, &change);
            }
        }

        tracing::debug!(published, "Poll cycle complete");
        published
    }
}

impl<B> std::fmt::Debug for Poller<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("hub", &self.hub.base_url())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
