// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The set of endpoints sharing one exact binding.

use super::Result;
use super::endpoint::DeliveryMode;
use super::endpoint::TransportEndpoint;
use super::hash::flow_hash;
use super::hash::reciprocal_scale;
use super::packet::PacketBuffer;
use super::packet::Route;
use crate::api::DemuxError;
use crate::api::EndpointId;
use core::fmt;
use std::sync::Arc;

/// The endpoints bound to the same `(EndpointId, NIC)` of one
/// protocol pair.
///
/// More than one member is only allowed when every member asked for
/// port reuse. Members are kept sorted by
/// [`TransportEndpoint::unique_id()`], so both removal and hash
/// selection are independent of the order in which endpoints
/// registered.
///
/// A set is never left in a registry while empty.
pub struct MultiEndpointSet {
    endpoints: Vec<Arc<dyn TransportEndpoint>>,
    // Whether more than one endpoint is allowed. Set by the first
    // member.
    reuse: bool,
}

impl MultiEndpointSet {
    pub(crate) fn new() -> Self {
        Self { endpoints: Vec::new(), reuse: false }
    }

    /// Add `ep` to the set.
    ///
    /// # Errors
    ///
    /// If the set already has members, both the set and the caller
    /// must have asked for port reuse; otherwise
    /// [`DemuxError::PortInUse`] is returned. The same endpoint
    /// cannot be added twice.
    pub fn add(
        &mut self,
        ep: Arc<dyn TransportEndpoint>,
        reuse_port: bool,
    ) -> Result<()> {
        if self.endpoints.is_empty() {
            self.reuse = reuse_port;
            self.endpoints.push(ep);
            return Ok(());
        }

        if !self.reuse || !reuse_port {
            return Err(DemuxError::PortInUse);
        }

        let uid = ep.unique_id();
        match self.endpoints.binary_search_by_key(&uid, |e| e.unique_id()) {
            Ok(_) => Err(DemuxError::PortInUse),
            Err(pos) => {
                self.endpoints.insert(pos, ep);
                Ok(())
            }
        }
    }

    /// Remove the endpoint with the given unique id, if it's a member.
    ///
    /// Return `true` if the set is now empty.
    pub fn remove(&mut self, unique_id: u64) -> bool {
        if let Ok(pos) =
            self.endpoints.binary_search_by_key(&unique_id, |e| e.unique_id())
        {
            self.endpoints.remove(pos);
        }
        self.endpoints.is_empty()
    }

    /// Select the member which receives the flow described by `id`.
    ///
    /// A lone member is always selected. Otherwise the flow hash,
    /// seeded with the owning group's `seed`, picks a member; a given
    /// flow keeps landing on the same member for as long as the
    /// membership doesn't change. Returns `None` only for an empty
    /// set.
    pub fn select(
        &self,
        id: &EndpointId,
        seed: u32,
    ) -> Option<&Arc<dyn TransportEndpoint>> {
        match self.endpoints.len() {
            0 => None,
            1 => self.endpoints.first(),
            n => {
                let hash = flow_hash(id, seed);
                let idx = reciprocal_scale(hash, n as u32);
                self.endpoints.get(idx as usize)
            }
        }
    }

    /// Every member, in unique id order.
    pub fn select_all(&self) -> &[Arc<dyn TransportEndpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn reuse(&self) -> bool {
        self.reuse
    }

    pub fn member_ids(&self) -> Vec<u64> {
        self.endpoints.iter().map(|e| e.unique_id()).collect()
    }
}

impl fmt::Debug for MultiEndpointSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MultiEndpointSet")
            .field("members", &self.member_ids())
            .field("reuse", &self.reuse)
            .finish()
    }
}

/// Deliver one packet to every endpoint in `eps`.
///
/// Delivery consumes the buffer, so each endpoint but the last gets
/// its own duplicate and the last is handed the original.
pub(crate) fn deliver_fan_out(
    mode: &DeliveryMode,
    route: &Route,
    id: &EndpointId,
    mut eps: Vec<Arc<dyn TransportEndpoint>>,
    pkt: PacketBuffer,
) {
    let Some(last) = eps.pop() else {
        return;
    };

    for ep in eps {
        mode.deliver(route, ep, id, pkt.duplicate());
    }
    mode.deliver(route, last, id, pkt);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::ControlType;
    use crate::api::IpAddr;
    use crate::api::NetworkProtocol;
    use crate::api::NicId;
    use std::sync::Mutex;

    struct TestEp {
        uid: u64,
        // Buffer addresses, to tell the original from a duplicate.
        rx: Mutex<Vec<usize>>,
    }

    impl TestEp {
        fn new(uid: u64) -> Arc<Self> {
            Arc::new(Self { uid, rx: Mutex::new(vec![]) })
        }
    }

    impl TransportEndpoint for TestEp {
        fn unique_id(&self) -> u64 {
            self.uid
        }

        fn handle_packet(
            &self,
            _route: &Route,
            _id: &EndpointId,
            pkt: PacketBuffer,
        ) {
            self.rx.lock().unwrap().push(pkt.as_bytes().as_ptr() as usize);
        }

        fn handle_control_packet(
            &self,
            _id: &EndpointId,
            _typ: ControlType,
            _extra: u32,
            _pkt: PacketBuffer,
        ) {
        }
    }

    fn flow(rport: u16) -> EndpointId {
        let local: IpAddr = "10.0.0.5".parse().unwrap();
        let remote: IpAddr = "10.0.0.9".parse().unwrap();
        EndpointId::connected((local, 53), (remote, rport))
    }

    #[test]
    fn first_add_always_succeeds() {
        let mut set = MultiEndpointSet::new();
        set.add(TestEp::new(1), false).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.reuse());
    }

    #[test]
    fn reuse_requires_mutual_consent() {
        let mut set = MultiEndpointSet::new();
        set.add(TestEp::new(1), false).unwrap();
        assert_eq!(set.add(TestEp::new(2), true), Err(DemuxError::PortInUse));

        let mut set = MultiEndpointSet::new();
        set.add(TestEp::new(1), true).unwrap();
        assert_eq!(set.add(TestEp::new(2), false), Err(DemuxError::PortInUse));
        set.add(TestEp::new(3), true).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn same_endpoint_twice() {
        let mut set = MultiEndpointSet::new();
        let ep = TestEp::new(1);
        set.add(ep.clone(), true).unwrap();
        assert_eq!(set.add(ep, true), Err(DemuxError::PortInUse));
    }

    #[test]
    fn members_ordered_by_unique_id() {
        let mut set = MultiEndpointSet::new();
        for uid in [30, 10, 20, 5] {
            set.add(TestEp::new(uid), true).unwrap();
        }
        assert_eq!(set.member_ids(), vec![5, 10, 20, 30]);

        assert!(!set.remove(20));
        assert!(!set.remove(99));
        assert_eq!(set.member_ids(), vec![5, 10, 30]);
        assert!(!set.remove(5));
        assert!(!set.remove(10));
        assert!(set.remove(30));
        assert!(set.is_empty());
    }

    #[test]
    fn lone_member_always_selected() {
        let mut set = MultiEndpointSet::new();
        set.add(TestEp::new(7), false).unwrap();
        for rport in 1000..1100 {
            let ep = set.select(&flow(rport), u32::from(rport)).unwrap();
            assert_eq!(ep.unique_id(), 7);
        }
    }

    #[test]
    fn selection_is_sticky_and_order_independent() {
        let mut a = MultiEndpointSet::new();
        let mut b = MultiEndpointSet::new();
        for uid in [1, 2, 3, 4] {
            a.add(TestEp::new(uid), true).unwrap();
        }
        for uid in [4, 2, 3, 1] {
            b.add(TestEp::new(uid), true).unwrap();
        }

        for rport in 1000..1200 {
            let id = flow(rport);
            let first = a.select(&id, 0xfeed).unwrap().unique_id();
            assert_eq!(a.select(&id, 0xfeed).unwrap().unique_id(), first);
            assert_eq!(b.select(&id, 0xfeed).unwrap().unique_id(), first);
        }
    }

    #[test]
    fn selection_spreads_flows() {
        let mut set = MultiEndpointSet::new();
        for uid in [1, 2, 3, 4] {
            set.add(TestEp::new(uid), true).unwrap();
        }

        let mut hit = std::collections::BTreeSet::new();
        for rport in 1000..2000 {
            hit.insert(set.select(&flow(rport), 0).unwrap().unique_id());
        }
        assert_eq!(hit.len(), 4);
    }

    #[test]
    fn empty_selects_nothing() {
        let set = MultiEndpointSet::new();
        assert!(set.select(&flow(1), 0).is_none());
        assert!(set.select_all().is_empty());
    }

    #[test]
    fn fan_out_gives_original_to_last() {
        let eps = vec![TestEp::new(1), TestEp::new(2), TestEp::new(3)];
        let dests: Vec<Arc<dyn TransportEndpoint>> = eps
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn TransportEndpoint>)
            .collect();
        let route = Route {
            net_proto: NetworkProtocol::Ipv4,
            nic: NicId(1),
            local_addr: "224.0.0.251".parse().unwrap(),
            remote_addr: "10.0.0.9".parse().unwrap(),
        };
        let pkt = PacketBuffer::copy(b"mdns");
        let orig = pkt.as_bytes().as_ptr() as usize;

        let id = flow(5353);
        deliver_fan_out(&DeliveryMode::Direct, &route, &id, dests, pkt);

        let got: Vec<usize> =
            eps.iter().map(|e| e.rx.lock().unwrap()[0]).collect();
        assert_ne!(got[0], orig);
        assert_ne!(got[1], orig);
        assert_eq!(got[2], orig);
    }
}
