// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP gateway to the hub REST API.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, ProtocolError};
use crate::state::{DeviceSnapshot, ResourceType};

/// Body of `PUT /api/<key>/lights/<id>/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LightStateUpdate {
    /// Brightness (0-255).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    /// Whether the light is on.
    pub on: bool,
}

impl LightStateUpdate {
    /// Sets brightness; a non-zero level also switches the light on.
    #[must_use]
    pub fn brightness(bri: u8) -> Self {
        Self {
            bri: Some(bri),
            on: bri > 0,
        }
    }

    /// Switches the light on or off.
    #[must_use]
    pub fn power(on: bool) -> Self {
        Self { bri: None, on }
    }
}

/// Client for the hub REST API.
///
/// Authenticated calls go to `{base}/api/{key}/...`. The key is shared
/// state so pairing can install one after the client is built; until then
/// every authenticated call fails with [`ProtocolError::NotPaired`]
/// without touching the network.
///
/// # Examples
///
/// ```no_run
/// use deconz_bridge::protocol::HubClient;
/// use deconz_bridge::state::ResourceType;
///
/// # async fn example() -> deconz_bridge::Result<()> {
/// let hub = HubClient::new("http://192.168.1.20")?;
/// hub.set_api_key("0A1B2C3D4E");
///
/// let lights = hub.fetch_snapshot(ResourceType::Lights).await?;
/// println!("{} lights", lights.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HubClient {
    base_url: String,
    client: Client,
    api_key: Arc<RwLock<Option<String>>>,
}

impl HubClient {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Device type announced when registering for an API key.
    pub const DEVICE_TYPE: &'static str = "mqtt-bridge";

    /// Creates a client for the hub at `base_url`.
    ///
    /// A bare host is treated as `http://host`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProtocolError> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(ProtocolError::InvalidAddress("hub address is required".to_string()));
        }

        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{base_url}")
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self {
            base_url,
            client,
            api_key: Arc::new(RwLock::new(None)),
        })
    }

    /// Returns the base URL of the hub.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Installs the API key used by authenticated calls.
    pub fn set_api_key(&self, key: impl Into<String>) {
        *self.api_key.write() = Some(key.into());
    }

    /// Returns `true` if an API key is installed.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.read().is_some()
    }

    /// Builds the URL for an authenticated API path.
    ///
    /// Returns `None` while no API key is installed.
    #[must_use]
    pub fn api_url(&self, suffix: &str) -> Option<String> {
        let key = self.api_key.read();
        let key = key.as_deref()?;
        Some(format!(
            "{}/api/{key}/{}",
            self.base_url,
            suffix.trim_start_matches('/')
        ))
    }

    /// Fetches and parses the full device list for a resource type.
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is not paired, the request fails, or the
    /// body is not a device list.
    pub async fn fetch_snapshot(&self, resource: ResourceType) -> Result<DeviceSnapshot, Error> {
        let body = self.get(resource.as_str()).await?;
        Ok(DeviceSnapshot::from_json(resource, body)?)
    }

    /// Sends a state update to a light.
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is not paired or the request fails.
    pub async fn set_light_state(
        &self,
        id: &str,
        update: &LightStateUpdate,
    ) -> Result<Value, ProtocolError> {
        let body = serde_json::to_value(update)
            .map_err(|e| ProtocolError::ConnectionFailed(format!("unencodable body: {e}")))?;
        self.put(&format!("lights/{id}/state"), &body).await
    }

    /// Performs an authenticated GET.
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is not paired or the request fails.
    pub async fn get(&self, suffix: &str) -> Result<Value, ProtocolError> {
        let url = self.api_url(suffix).ok_or(ProtocolError::NotPaired)?;
        self.send(Method::GET, &url, None).await
    }

    /// Performs an authenticated PUT with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the bridge is not paired or the request fails.
    pub async fn put(&self, suffix: &str, body: &Value) -> Result<Value, ProtocolError> {
        let url = self.api_url(suffix).ok_or(ProtocolError::NotPaired)?;
        self.send(Method::PUT, &url, Some(body)).await
    }

    /// Asks the hub for a new API key.
    ///
    /// This is unauthenticated and only succeeds while the hub's pairing
    /// window is open. The raw reply is returned for the caller to inspect,
    /// including the error list the hub sends with a 403 when the window
    /// is closed.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply is not JSON.
    pub async fn register(&self) -> Result<Value, ProtocolError> {
        let url = format!("{}/api", self.base_url);
        let body = serde_json::json!({ "devicetype": Self::DEVICE_TYPE });
        let (_, text) = self.exchange(Method::POST, &url, Some(&body)).await?;
        parse_reply(&text)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProtocolError> {
        let (status, text) = self.exchange(method, url, body).await?;

        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(ProtocolError::AuthenticationFailed);
        }

        if !status.is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        parse_reply(&text)
    }

    /// Sends a request and returns the status with the raw body.
    async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String), ProtocolError> {
        tracing::debug!(method = %method, url = %self.redact(url), "Sending hub request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ProtocolError::Http)?;
        let status = response.status();
        let text = response.text().await.map_err(ProtocolError::Http)?;

        tracing::trace!(status = status.as_u16(), body = %text, "Received hub response");
        Ok((status, text))
    }

    /// Masks the API key in a URL before it is logged.
    fn redact(&self, url: &str) -> String {
        match self.api_key.read().as_deref() {
            Some(key) if !key.is_empty() => url.replace(key, "***"),
            _ => url.to_string(),
        }
    }
}

fn parse_reply(text: &str) -> Result<Value, ProtocolError> {
    serde_json::from_str(text)
        .map_err(|e| ProtocolError::ConnectionFailed(format!("invalid JSON reply: {e}")))
}
