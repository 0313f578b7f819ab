// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API key persistence.
//!
//! The hub issues a single API key during pairing. It is stored once and
//! read back on every start; the bridge never rotates it.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// Storage for the hub API key.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored key, if any.
    fn get(&self) -> Option<String>;

    /// Persists a new key.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the key cannot be written.
    fn set(&self, key: &str) -> Result<(), CredentialError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyDocument {
    #[serde(rename = "api-key", default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

/// Key store backed by a JSON file.
///
/// The default location is `<config dir>/configstore/deconz-key.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store at an explicit path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the default per-user location.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::NoConfigDir` if the platform has no
    /// configuration directory.
    pub fn default_location() -> Result<Self, CredentialError> {
        let mut path = dirs::config_dir().ok_or(CredentialError::NoConfigDir)?;
        path.push("configstore");
        path.push("deconz-key.json");
        Ok(Self::new(path))
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<KeyDocument, CredentialError> {
        if !self.path.exists() {
            return Ok(KeyDocument::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        match self.load() {
            Ok(doc) => doc.api_key.filter(|k| !k.is_empty()),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to read API key file");
                None
            }
        }
    }

    fn set(&self, key: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let doc = KeyDocument {
            api_key: Some(key.to_string()),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;

        tracing::info!(path = %self.path.display(), "Saved API key");
        Ok(())
    }
}

/// In-memory key store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    key: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `key`.
    #[must_use]
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Mutex::new(Some(key.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.key.lock().clone()
    }

    fn set(&self, key: &str) -> Result<(), CredentialError> {
        *self.key.lock() = Some(key.to_string());
        Ok(())
    }
}
