// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device snapshots and the cache used for name resolution.
//!
//! The hub reports devices as JSON objects keyed by id. A [`DeviceSnapshot`]
//! holds one such full report for a [`ResourceType`]; the [`DeviceCache`]
//! keeps the latest light and sensor snapshots and maps ids to topic-safe
//! names and back.

mod cache;
mod device;
mod naming;

pub use cache::DeviceCache;
pub use device::{DeviceId, DeviceRecord, DeviceSnapshot, ResourceType};
pub use naming::normalize_name;
