// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The demux engine.
//!
//! Lookup is three levels deep. A [`registry::EndpointRegistry`]
//! exists per protocol pair and maps an [`crate::api::EndpointId`] to a
//! [`nic_group::NicGroup`]. The group maps the NIC an endpoint is
//! bound to onto a [`multi::MultiEndpointSet`], the set of endpoints
//! sharing that exact binding under port reuse.
pub mod demux;
pub mod endpoint;
pub mod hash;
pub mod multi;
pub mod nic_group;
pub mod packet;
pub mod registry;
pub mod stat;

pub use demux::Demuxer;
pub use demux::DemuxerBuilder;
pub use endpoint::DeliveryMode;
pub use endpoint::QueuedTransportProtocol;
pub use endpoint::RawTransportEndpoint;
pub use endpoint::TransportEndpoint;
pub use packet::PacketBuffer;
pub use packet::Route;

pub type Result<T> = core::result::Result<T, crate::api::DemuxError>;
