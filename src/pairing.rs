// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Obtaining the hub API key.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::credentials::CredentialStore;
use crate::error::{Error, ParseError, ProtocolError};
use crate::protocol::HubClient;

/// Result of [`PairingManager::ensure_paired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    /// A stored key was installed.
    Stored,
    /// The hub issued a new key, which was stored and installed.
    Registered,
    /// No key is available; the bridge runs degraded.
    Unpaired,
}

impl PairingOutcome {
    /// Returns `true` if the hub client now holds a key.
    #[must_use]
    pub fn is_paired(self) -> bool {
        !matches!(self, Self::Unpaired)
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationEntry {
    success: Option<RegistrationSuccess>,
    error: Option<RegistrationError>,
}

#[derive(Debug, Deserialize)]
struct RegistrationSuccess {
    username: String,
}

#[derive(Debug, Deserialize)]
struct RegistrationError {
    #[serde(default)]
    description: String,
}

/// Installs an API key into the hub client, registering for one if none is
/// stored.
pub struct PairingManager {
    hub: HubClient,
    store: Arc<dyn CredentialStore>,
}

impl PairingManager {
    /// Creates a manager for `hub` backed by `store`.
    pub fn new(hub: HubClient, store: Arc<dyn CredentialStore>) -> Self {
        Self { hub, store }
    }

    /// Makes sure the hub client holds an API key.
    ///
    /// Registration is attempted once, and only when the store is empty.
    /// It succeeds only while the hub's link button window is open; any
    /// failure is logged and leaves the bridge unpaired.
    pub async fn ensure_paired(&self) -> PairingOutcome {
        if let Some(key) = self.store.get() {
            tracing::debug!("Using stored API key");
            self.hub.set_api_key(key);
            return PairingOutcome::Stored;
        }

        tracing::info!(hub = %self.hub.base_url(), "No API key stored, registering with hub");

        let key = match self.register().await {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(error = %e, "Pairing failed, press the hub link button and restart");
                return PairingOutcome::Unpaired;
            }
        };

        if let Err(e) = self.store.set(&key) {
            // The key still works for this run.
            tracing::error!(error = %e, "Failed to persist API key");
        }
        self.hub.set_api_key(key);

        tracing::info!("Paired with hub");
        PairingOutcome::Registered
    }

    async fn register(&self) -> Result<String, Error> {
        let reply = self.hub.register().await?;
        Ok(parse_registration(reply)?)
    }
}

impl std::fmt::Debug for PairingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingManager")
            .field("hub", &self.hub.base_url())
            .finish_non_exhaustive()
    }
}

/// Extracts the issued key from a registration reply.
///
/// The hub answers with a one-element list holding either
/// `{"success": {"username": ...}}` or `{"error": {"description": ...}}`.
fn parse_registration(reply: Value) -> Result<String, Error> {
    let entries: Vec<RegistrationEntry> =
        serde_json::from_value(reply).map_err(ParseError::from)?;

    let [entry] = <[RegistrationEntry; 1]>::try_from(entries).map_err(|entries| {
        ParseError::UnexpectedFormat(format!(
            "expected one registration entry, got {}",
            entries.len()
        ))
    })?;

    if let Some(success) = entry.success {
        return Ok(success.username);
    }

    if let Some(error) = entry.error {
        return Err(ProtocolError::PairingRejected(error.description).into());
    }

    Err(ParseError::MissingField("success.username".to_string()).into())
}
