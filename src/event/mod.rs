// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw device change events.
//!
//! Both the push feed and the poller produce [`ChangeEvent`]s; the
//! [`Origin`] tells the translator which one did.

mod change;

pub use change::{ChangeEvent, FeedMessage, Origin};
