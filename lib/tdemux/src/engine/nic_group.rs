// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Per-NIC binding of one endpoint identity.

use super::Result;
use super::endpoint::TransportEndpoint;
use super::multi::MultiEndpointSet;
use crate::api::BindingDump;
use crate::api::EndpointId;
use crate::api::NicId;
use crate::ddi::sync::KRwLock;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

/// All endpoints registered under one [`EndpointId`], split by the
/// NIC they are bound to.
///
/// An endpoint bound to [`NicId::ANY`] accepts traffic from any NIC
/// that has no set of its own.
pub struct NicGroup {
    seed: u32,
    sets: KRwLock<BTreeMap<NicId, MultiEndpointSet>>,
}

impl NicGroup {
    pub(crate) fn new(seed: u32) -> Self {
        Self { seed, sets: KRwLock::new(BTreeMap::new()) }
    }

    /// The seed mixed into the selection hash for every set in this
    /// group. Fixed for the life of the group.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Run `f` against the set traffic from `nic` is delivered to: the
    /// set bound to `nic`, or else the set bound to any NIC.
    ///
    /// The group's lock is held for the duration of `f`.
    pub fn resolve<R>(
        &self,
        nic: NicId,
        f: impl FnOnce(&MultiEndpointSet) -> R,
    ) -> Option<R> {
        let sets = self.sets.read();
        sets.get(&nic).or_else(|| sets.get(&NicId::ANY)).map(f)
    }

    /// Select the single endpoint which receives the flow `id` arriving
    /// on `nic`.
    pub fn select(
        &self,
        nic: NicId,
        id: &EndpointId,
    ) -> Option<Arc<dyn TransportEndpoint>> {
        self.resolve(nic, |set| set.select(id, self.seed).cloned()).flatten()
    }

    /// Append all endpoints which receive traffic arriving on `nic` to
    /// `eps`.
    pub(crate) fn extend_all(
        &self,
        nic: NicId,
        eps: &mut Vec<Arc<dyn TransportEndpoint>>,
    ) {
        self.resolve(nic, |set| eps.extend(set.select_all().iter().cloned()));
    }

    pub fn register_endpoint(
        &self,
        nic: NicId,
        ep: Arc<dyn TransportEndpoint>,
        reuse_port: bool,
    ) -> Result<()> {
        let mut sets = self.sets.write();
        match sets.entry(nic) {
            Entry::Occupied(mut e) => e.get_mut().add(ep, reuse_port),

            Entry::Vacant(e) => {
                let mut set = MultiEndpointSet::new();
                set.add(ep, reuse_port)?;
                e.insert(set);
                Ok(())
            }
        }
    }

    /// Remove the endpoint from the set bound to `nic`, dropping the
    /// set if that leaves it empty.
    ///
    /// Return `true` if the group as a whole is now empty.
    pub fn unregister_endpoint(&self, nic: NicId, unique_id: u64) -> bool {
        let mut sets = self.sets.write();
        let set_empty =
            sets.get_mut(&nic).is_some_and(|set| set.remove(unique_id));
        if set_empty {
            sets.remove(&nic);
        }
        sets.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.read().is_empty()
    }

    /// Every endpoint in the group, across all NICs.
    pub fn transport_endpoints(&self) -> Vec<Arc<dyn TransportEndpoint>> {
        let sets = self.sets.read();
        sets.values().flat_map(|set| set.select_all().iter().cloned()).collect()
    }

    pub(crate) fn dump(&self, id: &EndpointId) -> Vec<BindingDump> {
        let sets = self.sets.read();
        sets.iter()
            .map(|(nic, set)| BindingDump {
                id: *id,
                nic: *nic,
                reuse: set.reuse(),
                members: set.member_ids(),
            })
            .collect()
    }
}

impl core::fmt::Debug for NicGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let sets = self.sets.read();
        f.debug_struct("NicGroup")
            .field("seed", &self.seed)
            .field("sets", &*sets)
            .finish()
    }
}
