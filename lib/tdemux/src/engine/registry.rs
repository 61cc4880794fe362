// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The endpoint registry of a single protocol pair.

use super::Result;
use super::endpoint::DeliveryMode;
use super::endpoint::RawTransportEndpoint;
use super::endpoint::TransportEndpoint;
use super::endpoint::same_raw;
use super::nic_group::NicGroup;
use crate::api::DeliveryKind;
use crate::api::DumpEndpointsResp;
use crate::api::EndpointId;
use crate::api::NicId;
use crate::api::ProtocolPair;
use crate::ddi::sync::KRwLock;
use crate::provider::SeedProvider;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The ids an inbound packet's `id` may have been registered under,
/// most specific first:
///
/// 1. the exact id,
/// 2. local address wildcarded,
/// 3. remote address and port wildcarded,
/// 4. local port only.
///
/// Tiers which collapse onto an earlier one (because `id` is itself
/// partially wildcarded) are left out.
pub fn match_tiers(id: &EndpointId) -> impl Iterator<Item = EndpointId> {
    let candidates = [
        *id,
        id.without_local_addr(),
        id.without_remote(),
        EndpointId::listen(id.local_port),
    ];

    (0..candidates.len()).filter_map(move |i| {
        let c = candidates[i];
        (!candidates[..i].contains(&c)).then_some(c)
    })
}

#[derive(Default)]
struct RegistryData {
    endpoints: BTreeMap<EndpointId, Arc<NicGroup>>,
    raw: Vec<Arc<dyn RawTransportEndpoint>>,
}

/// Every endpoint registered for one `(network, transport)` pair.
///
/// The registry lock guards the mapping from id to group; each group
/// has its own lock for its sets. Delivery lookups take the group's
/// read lock while still holding the registry's, so a group can't be
/// emptied and removed between finding it and selecting from it.
/// Group write locks are only taken under the registry write lock.
pub struct EndpointRegistry {
    pair: ProtocolPair,
    delivery: DeliveryMode,
    data: KRwLock<RegistryData>,
}

impl EndpointRegistry {
    pub fn new(pair: ProtocolPair, delivery: DeliveryMode) -> Self {
        Self { pair, delivery, data: KRwLock::new(RegistryData::default()) }
    }

    pub fn pair(&self) -> ProtocolPair {
        self.pair
    }

    pub fn delivery(&self) -> &DeliveryMode {
        &self.delivery
    }

    /// Register `ep` under `(id, nic)`.
    ///
    /// A new group draws its seed from `seeds`. An id with a nonzero
    /// remote port names a single connection, and never shares its
    /// binding, whatever `reuse_port` says.
    pub fn register(
        &self,
        id: EndpointId,
        nic: NicId,
        ep: Arc<dyn TransportEndpoint>,
        reuse_port: bool,
        seeds: &dyn SeedProvider,
    ) -> Result<()> {
        let reuse_port = reuse_port && id.remote_port == 0;
        let mut data = self.data.write();
        let group = data
            .endpoints
            .entry(id)
            .or_insert_with(|| Arc::new(NicGroup::new(seeds.next_seed())));

        let res = group.register_endpoint(nic, ep, reuse_port);
        if group.is_empty() {
            data.endpoints.remove(&id);
        }
        res
    }

    /// Remove the endpoint with `unique_id` from `(id, nic)`.
    ///
    /// Return `true` if nothing remains registered under `id` after
    /// the call.
    pub fn unregister(&self, id: &EndpointId, nic: NicId, unique_id: u64) -> bool {
        let mut data = self.data.write();
        let Some(group) = data.endpoints.get(id) else {
            return true;
        };

        if group.unregister_endpoint(nic, unique_id) {
            data.endpoints.remove(id);
            return true;
        }
        false
    }

    /// The group of the most specific registration matching `id`.
    ///
    /// Only the first tier with a registration is considered, even if
    /// that group has nothing bound to the receiving NIC.
    pub fn find_best_match(&self, id: &EndpointId) -> Option<Arc<NicGroup>> {
        let data = self.data.read();
        match_tiers(id).find_map(|tier| data.endpoints.get(&tier).cloned())
    }

    /// The groups of every registration matching `id`, most specific
    /// first.
    pub fn find_all_matches(&self, id: &EndpointId) -> Vec<Arc<NicGroup>> {
        let data = self.data.read();
        match_tiers(id)
            .filter_map(|tier| data.endpoints.get(&tier).cloned())
            .collect()
    }

    /// Select the endpoint which receives the flow `id` arriving on
    /// `nic`, from the most specific matching registration.
    pub fn select_best(
        &self,
        id: &EndpointId,
        nic: NicId,
    ) -> Option<Arc<dyn TransportEndpoint>> {
        let data = self.data.read();
        match_tiers(id)
            .find_map(|tier| data.endpoints.get(&tier))?
            .select(nic, id)
    }

    /// Every endpoint of every registration matching `id` which
    /// receives traffic arriving on `nic`, most specific first.
    pub fn select_all_matches(
        &self,
        id: &EndpointId,
        nic: NicId,
    ) -> Vec<Arc<dyn TransportEndpoint>> {
        let data = self.data.read();
        let mut dests = Vec::new();
        let groups =
            match_tiers(id).filter_map(|tier| data.endpoints.get(&tier));
        for group in groups {
            group.extend_all(nic, &mut dests);
        }
        dests
    }

    /// The group registered under exactly `id`.
    pub fn get(&self, id: &EndpointId) -> Option<Arc<NicGroup>> {
        self.data.read().endpoints.get(id).map(Arc::clone)
    }

    pub fn add_raw(&self, ep: Arc<dyn RawTransportEndpoint>) {
        self.data.write().raw.push(ep);
    }

    /// Remove `ep` if registered. Return `true` if it was.
    pub fn remove_raw(&self, ep: &Arc<dyn RawTransportEndpoint>) -> bool {
        let mut data = self.data.write();
        match data.raw.iter().position(|r| same_raw(r, ep)) {
            Some(pos) => {
                data.raw.remove(pos);
                true
            }

            None => false,
        }
    }

    pub fn raw_endpoints(&self) -> Vec<Arc<dyn RawTransportEndpoint>> {
        self.data.read().raw.clone()
    }

    /// Every registered (non-raw) endpoint, in id order.
    pub fn transport_endpoints(&self) -> Vec<Arc<dyn TransportEndpoint>> {
        let groups: Vec<Arc<NicGroup>> =
            self.data.read().endpoints.values().map(Arc::clone).collect();
        groups.iter().flat_map(|g| g.transport_endpoints()).collect()
    }

    pub fn num_ids(&self) -> usize {
        self.data.read().endpoints.len()
    }

    pub fn dump(&self) -> DumpEndpointsResp {
        let data = self.data.read();
        let bindings = data
            .endpoints
            .iter()
            .flat_map(|(id, group)| group.dump(id))
            .collect();

        DumpEndpointsResp {
            pair: self.pair,
            delivery: if self.delivery.is_queued() {
                DeliveryKind::Queued
            } else {
                DeliveryKind::Direct
            },
            bindings,
            raw_endpoints: data.raw.len() as u64,
        }
    }
}

impl core::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("pair", &self.pair)
            .field("delivery", &self.delivery)
            .field("ids", &self.num_ids())
            .finish()
    }
}
