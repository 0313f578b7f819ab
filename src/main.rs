// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `deconz-bridge` - run the bridge with settings from the environment.
//!
//! | Variable                  | Meaning                             | Default          |
//! |---------------------------|-------------------------------------|------------------|
//! | `DECONZ_IP`               | Hub address, `host[:port]`          | required         |
//! | `DECONZ_PORT`             | Push feed port                      | `443`            |
//! | `TOPIC_PREFIX`            | Topic prefix                        | required         |
//! | `MQTT_RETAIN`             | Retain state messages               | `false`          |
//! | `TIMEZONE` / `TZ`         | Zone for staleness checks           | system zone      |
//! | `MQTT_HOST`               | Broker, `mqtt://host:port`          | `localhost:1883` |
//! | `MQTT_USER` / `MQTT_PASS` | Broker credentials                  | none             |
//! | `RUST_LOG`                | Log filter                          | `info`           |

use std::process::ExitCode;
use std::sync::Arc;

use deconz_bridge::credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use deconz_bridge::{Bridge, BridgeConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let store: Arc<dyn CredentialStore> = match FileCredentialStore::default_location() {
        Ok(store) => {
            tracing::debug!(path = %store.path().display(), "Using API key file");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "No key file location, the API key will not persist");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    match Bridge::new(config, store).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Bridge stopped");
            ExitCode::FAILURE
        }
    }
}
