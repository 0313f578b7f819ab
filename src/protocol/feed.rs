// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Push feed connection with fixed-delay reconnect.
//!
//! The connection lifecycle is a small explicit state machine,
//! [`FeedStateMachine`], driven by the [`FeedManager`] task:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──opened──▶ Connected
//!      ▲                        │                      │
//!      └────────error/close─────┴──────────────────────┘
//! ```
//!
//! Entering `Connected` requests a resync poll. Leaving it schedules a
//! single reconnect after the configured delay; further error or close
//! events while a reconnect is pending are absorbed.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use super::mqtt::MessageBus;
use crate::error::ProtocolError;
use crate::event::{FeedMessage, Origin};
use crate::translate::EventTranslator;

/// Feed connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// The feed is open.
    Connected,
}

/// Input to the feed state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    /// A connection attempt starts.
    Connecting,
    /// The socket opened.
    Opened,
    /// The socket reported an error.
    Error,
    /// The socket closed.
    Closed,
    /// The reconnect delay elapsed.
    ReconnectDue,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedAction {
    /// Request an immediate full poll.
    RequestResync,
    /// Start the reconnect delay.
    ScheduleReconnect,
    /// Open a new connection now.
    Reconnect,
}

/// Connection state plus the single pending reconnect timer.
#[derive(Debug, Clone, Default)]
pub struct FeedStateMachine {
    state: ConnectionState,
    reconnect_pending: bool,
}

impl FeedStateMachine {
    /// Creates a machine in [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` while a reconnect timer is running.
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Applies an event and returns the action it requires, if any.
    pub fn handle(&mut self, event: FeedEvent) -> Option<FeedAction> {
        match event {
            FeedEvent::Connecting => {
                if self.state == ConnectionState::Disconnected {
                    self.state = ConnectionState::Connecting;
                }
                None
            }
            FeedEvent::Opened => {
                self.state = ConnectionState::Connected;
                self.reconnect_pending = false;
                Some(FeedAction::RequestResync)
            }
            FeedEvent::Error | FeedEvent::Closed => {
                self.state = ConnectionState::Disconnected;
                if self.reconnect_pending {
                    None
                } else {
                    self.reconnect_pending = true;
                    Some(FeedAction::ScheduleReconnect)
                }
            }
            FeedEvent::ReconnectDue => {
                self.reconnect_pending = false;
                (self.state == ConnectionState::Disconnected).then_some(FeedAction::Reconnect)
            }
        }
    }
}

/// Owns the push feed connection and forwards changes to the translator.
pub struct FeedManager<B> {
    url: String,
    reconnect_delay: Duration,
    translator: Arc<EventTranslator<B>>,
    resync: Arc<Notify>,
    state: Arc<RwLock<ConnectionState>>,
}

impl<B: MessageBus + 'static> FeedManager<B> {
    /// Creates a manager for the feed at `url` (`ws://host:port`).
    ///
    /// `resync` is notified every time the feed opens.
    pub fn new(
        url: impl Into<String>,
        reconnect_delay: Duration,
        translator: Arc<EventTranslator<B>>,
        resync: Arc<Notify>,
    ) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            translator,
            resync,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Runs the connection loop on a new task.
    pub fn spawn(self) -> FeedHandle {
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(self.run());
        FeedHandle { state, task }
    }

    /// Runs the connection loop until the task is dropped.
    ///
    /// Sleeping and reconnecting follow the actions of the state machine:
    /// the timer starts only on [`FeedAction::ScheduleReconnect`] and a new
    /// connection is opened only on [`FeedAction::Reconnect`].
    pub async fn run(self) {
        let mut machine = FeedStateMachine::new();
        let mut reconnect_at: Option<Instant> = None;
        self.apply(&mut machine, FeedEvent::Connecting);

        loop {
            let mut actions = Vec::with_capacity(2);
            match self.connect_and_read(&mut machine).await {
                Ok(()) => {
                    tracing::info!(url = %self.url, "Hub feed closed");
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Hub feed error");
                    actions.extend(self.apply(&mut machine, FeedEvent::Error));
                }
            }
            // A failed socket reports both; only the first schedules.
            actions.extend(self.apply(&mut machine, FeedEvent::Closed));

            if actions.contains(&FeedAction::ScheduleReconnect) {
                reconnect_at = Some(Instant::now() + self.reconnect_delay);
            }

            let Some(due) = reconnect_at.take() else {
                tracing::error!(url = %self.url, "Hub feed closed without a reconnect timer");
                return;
            };
            tokio::time::sleep_until(due).await;

            if self.apply(&mut machine, FeedEvent::ReconnectDue) != Some(FeedAction::Reconnect) {
                tracing::debug!(state = ?machine.state(), "Reconnect no longer needed");
                return;
            }
            self.apply(&mut machine, FeedEvent::Connecting);
        }
    }

    async fn connect_and_read(&self, machine: &mut FeedStateMachine) -> Result<(), ProtocolError> {
        tracing::info!(url = %self.url, "Connecting to hub feed");

        let (mut stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        self.apply(machine, FeedEvent::Opened);

        while let Some(frame) = stream.next().await {
            match frame? {
                Message::Text(text) => self.dispatch(&text),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "Hub feed close frame received");
                    return Ok(());
                }
                Message::Ping(_) => tracing::trace!("Hub feed ping"),
                _ => {}
            }
        }

        Ok(())
    }

    /// Feeds an event to the machine and carries out the resulting action
    /// that needs no waiting.
    fn apply(&self, machine: &mut FeedStateMachine, event: FeedEvent) -> Option<FeedAction> {
        let action = machine.handle(event);
        *self.state.write() = machine.state();

        match action {
            Some(FeedAction::RequestResync) => {
                tracing::info!(url = %self.url, "Hub feed connected");
                self.resync.notify_one();
            }
            Some(FeedAction::ScheduleReconnect) => {
                tracing::info!(
                    delay_secs = self.reconnect_delay.as_secs(),
                    "Hub feed reconnect scheduled"
                );
            }
            Some(FeedAction::Reconnect) | None => {}
        }
        action
    }

    fn dispatch(&self, text: &str) {
        let message = match FeedMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed feed message");
                return;
            }
        };

        let kind = message.event.clone();
        let Some(change) = message.into_change() else {
            tracing::trace!(event = ?kind, "Ignoring feed message");
            return;
        };

        let published = self.translator.handle(Origin::Live, &change);
        tracing::debug!(
            resource = ?change.resource,
            id = ?change.id,
            published,
            "Feed change handled"
        );
    }
}

impl<B> std::fmt::Debug for FeedManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedManager")
            .field("url", &self.url)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

/// Handle to a running feed task.
#[derive(Debug)]
pub struct FeedHandle {
    state: Arc<RwLock<ConnectionState>>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Stops the feed task.
    pub fn abort(&self) {
        self.task.abort();
    }
}
