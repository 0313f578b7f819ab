// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! Failures are grouped by where they originate: hub and bus transport,
//! payload parsing, startup configuration, and API key persistence.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while talking to the hub or the message bus.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a hub payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Startup configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The API key could not be read or persisted.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
}

/// Errors related to transport (HTTP, push feed, MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT client request could not be queued.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Push feed socket failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// No API key is available, so authenticated calls are skipped.
    #[error("no API key available, the bridge is not paired with the hub")]
    NotPaired,

    /// Connection to the hub failed or returned an unexpected status.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The hub rejected the API key.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The hub refused to issue an API key.
    #[error("pairing rejected: {0}")]
    PairingRejected(String),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors related to parsing hub payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the payload.
    #[error("missing field in payload: {0}")]
    MissingField(String),

    /// Unexpected payload shape.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// Errors raised while loading startup configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is not set")]
    MissingVariable(&'static str),

    /// A variable is set to a value that cannot be used.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Name of the variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Errors related to API key persistence.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Reading or writing the key file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No per-user configuration directory could be located.
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
