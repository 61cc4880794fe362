// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The capabilities a transport protocol implementation provides to
//! the demuxer.

use super::packet::PacketBuffer;
use super::packet::Route;
use crate::api::ControlType;
use crate::api::EndpointId;
use core::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Allocate an endpoint unique id.
///
/// Ids are handed out in increasing order for the life of the
/// process and never reused. Endpoint implementations call this once
/// at creation and return the value from
/// [`TransportEndpoint::unique_id()`].
pub fn next_unique_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A bound transport endpoint (e.g., a TCP or UDP socket).
pub trait TransportEndpoint: Send + Sync {
    /// The stable identity of this endpoint. Registries order and
    /// remove members by this value.
    fn unique_id(&self) -> u64;

    /// Take ownership of an inbound packet addressed to this endpoint.
    fn handle_packet(&self, route: &Route, id: &EndpointId, pkt: PacketBuffer);

    /// Take ownership of a control message (e.g., an ICMP error)
    /// concerning traffic this endpoint sent.
    fn handle_control_packet(
        &self,
        id: &EndpointId,
        typ: ControlType,
        extra: u32,
        pkt: PacketBuffer,
    );
}

impl fmt::Debug for dyn TransportEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TransportEndpoint({})", self.unique_id())
    }
}

/// A raw endpoint, receiving all traffic for its protocol pair
/// regardless of address or port.
///
/// The packet is lent, not given: a raw endpoint copies what it
/// needs.
pub trait RawTransportEndpoint: Send + Sync {
    fn handle_packet(&self, route: &Route, pkt: &PacketBuffer);
}

/// A transport protocol which wants its packets handed off to a queue
/// it drains itself, rather than delivered straight to the endpoint
/// on the caller's thread.
pub trait QueuedTransportProtocol: Send + Sync {
    fn queue_packet(
        &self,
        route: &Route,
        ep: Arc<dyn TransportEndpoint>,
        id: &EndpointId,
        pkt: PacketBuffer,
    );
}

/// How packets for a transport protocol reach their endpoint. Fixed
/// when the demuxer is built.
#[derive(Clone, Default)]
pub enum DeliveryMode {
    #[default]
    Direct,
    Queued(Arc<dyn QueuedTransportProtocol>),
}

impl DeliveryMode {
    /// Deliver `pkt` to `ep` according to this mode.
    pub(crate) fn deliver(
        &self,
        route: &Route,
        ep: Arc<dyn TransportEndpoint>,
        id: &EndpointId,
        pkt: PacketBuffer,
    ) {
        match self {
            Self::Direct => ep.handle_packet(route, id, pkt),
            Self::Queued(q) => q.queue_packet(route, ep, id, pkt),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

impl fmt::Debug for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "Direct"),
            Self::Queued(_) => write!(f, "Queued"),
        }
    }
}

/// Are `a` and `b` the same raw endpoint object?
///
/// Only the data pointers are compared; the vtable half of a fat
/// pointer is not guaranteed unique per type.
pub(crate) fn same_raw(
    a: &Arc<dyn RawTransportEndpoint>,
    b: &Arc<dyn RawTransportEndpoint>,
) -> bool {
    core::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
