// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types shared between the transport demuxer engine and the network
//! stack which embeds it.
//!
//! Nothing in here performs any demultiplexing. These are the values
//! that cross the boundary: addresses, protocol numbers, endpoint
//! identities, configuration, errors, and dump responses.

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod cmd;
pub mod endpoint;
pub mod ip;
pub mod proto;

pub use cmd::*;
pub use endpoint::*;
pub use ip::*;
pub use proto::*;

/// The overall version of the API. Anytime a type in this crate is
/// added, removed, or modified in a way visible to a consumer, this
/// number should increment.
pub const API_VERSION: u64 = 3;
