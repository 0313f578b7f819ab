// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change-filtered publishing of normalized signals.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::mqtt::MessageBus;
use crate::translate::{NormalizedSignal, PublishMode};

/// Publishes signals to a bus, skipping values that did not change.
///
/// The last successfully published value is remembered per topic. A
/// signal in [`PublishMode::OnChange`] whose value equals the remembered
/// one is dropped; [`PublishMode::Always`] signals are always sent and do
/// not touch the remembered values.
#[derive(Debug)]
pub struct SignalPublisher<B> {
    bus: B,
    last_values: Mutex<HashMap<String, String>>,
}

impl<B: MessageBus> SignalPublisher<B> {
    /// Wraps a bus.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            last_values: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Publishes one signal.
    ///
    /// Returns `true` if the signal was handed to the bus.
    pub fn publish(&self, signal: &NormalizedSignal) -> bool {
        if signal.mode == PublishMode::Always {
            return self.send(signal);
        }

        // Held across the send so concurrent sources cannot interleave
        // between the comparison and the update.
        let mut last_values = self.last_values.lock();
        if last_values.get(&signal.topic) == Some(&signal.value) {
            tracing::trace!(topic = %signal.topic, "Unchanged, not publishing");
            return false;
        }

        if self.send(signal) {
            last_values.insert(signal.topic.clone(), signal.value.clone());
            true
        } else {
            false
        }
    }

    /// Publishes every signal in order, returning how many were sent.
    pub fn publish_all<'a, I>(&self, signals: I) -> usize
    where
        I: IntoIterator<Item = &'a NormalizedSignal>,
    {
        signals.into_iter().filter(|s| self.publish(s)).count()
    }

    /// Forgets all remembered values, so the next signal on every topic is
    /// published.
    pub fn reset(&self) {
        self.last_values.lock().clear();
    }

    fn send(&self, signal: &NormalizedSignal) -> bool {
        match self.bus.publish(&signal.topic, &signal.value, signal.retain) {
            Ok(()) => {
                tracing::debug!(topic = %signal.topic, value = %signal.value, "Published signal");
                true
            }
            Err(e) => {
                tracing::error!(topic = %signal.topic, error = %e, "Failed to publish signal");
                false
            }
        }
    }
}
