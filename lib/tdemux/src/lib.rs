// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The transport demuxer.
//!
//! Routes inbound network-layer packets to the transport endpoint
//! bound to them, based on the protocol pair, the endpoint identity
//! built from the packet's headers, and the receiving NIC. See
//! [`engine::demux::Demuxer`] for the entry points.

#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

pub mod api;
pub mod ddi;
pub mod engine;
#[cfg(feature = "print")]
pub mod print;
pub mod provider;

use provider::LogProvider;
use provider::SeedProvider;

/// The execution context handed to a [`engine::demux::Demuxer`].
///
/// The `ExecCtx` provides implementations of the services which
/// depend on the context the stack runs in.
pub struct ExecCtx {
    pub log: Box<dyn LogProvider>,
    pub seed: Box<dyn SeedProvider>,
}
