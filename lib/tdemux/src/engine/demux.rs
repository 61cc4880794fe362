// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The demuxer: registration and the three delivery entry points.

use super::Result;
use super::endpoint::DeliveryMode;
use super::endpoint::QueuedTransportProtocol;
use super::endpoint::RawTransportEndpoint;
use super::endpoint::TransportEndpoint;
use super::multi::deliver_fan_out;
use super::packet::PacketBuffer;
use super::packet::Route;
use super::registry::EndpointRegistry;
use super::stat::StackStats;
use crate::ExecCtx;
use crate::api::ControlType;
use crate::api::DeliveryKind;
use crate::api::DemuxCfg;
use crate::api::DemuxError;
use crate::api::DumpEndpointsResp;
use crate::api::EndpointId;
use crate::api::NetworkProtocol;
use crate::api::NicId;
use crate::api::ProtocolDesc;
use crate::api::ProtocolPair;
use crate::api::TransportProtocol;
use crate::provider::LogLevel;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Build a [`Demuxer`] from a [`DemuxCfg`].
pub struct DemuxerBuilder {
    ectx: Arc<ExecCtx>,
    cfg: DemuxCfg,
    queued: BTreeMap<TransportProtocol, Arc<dyn QueuedTransportProtocol>>,
    stats: Option<Arc<StackStats>>,
}

impl DemuxerBuilder {
    /// Start building a demuxer serving every `(network, transport)`
    /// pair of `cfg`.
    ///
    /// # Errors
    ///
    /// [`DemuxError::BadConfig`] if `cfg` fails validation.
    pub fn new(cfg: &DemuxCfg, ectx: Arc<ExecCtx>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            ectx,
            cfg: cfg.clone(),
            queued: BTreeMap::new(),
            stats: None,
        })
    }

    /// Hand packets for `transport` to `q` instead of delivering them
    /// to the endpoint directly. Applies under every network protocol.
    pub fn queued(
        mut self,
        transport: TransportProtocol,
        q: Arc<dyn QueuedTransportProtocol>,
    ) -> Self {
        self.queued.insert(transport, q);
        self
    }

    /// Use the stack's counters rather than a private set.
    pub fn stats(mut self, stats: Arc<StackStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// # Errors
    ///
    /// [`DemuxError::BadConfig`] if a queued transport protocol is not
    /// part of the configuration.
    pub fn create(self) -> Result<Demuxer> {
        for transport in self.queued.keys() {
            if !self.cfg.transport_protocols.contains(transport) {
                return Err(DemuxError::BadConfig(format!(
                    "queued transport protocol {transport} is not configured"
                )));
            }
        }

        let mut protocols = BTreeMap::new();
        for pair in self.cfg.pairs() {
            let delivery = match self.queued.get(&pair.transport) {
                Some(q) => DeliveryMode::Queued(Arc::clone(q)),
                None => DeliveryMode::Direct,
            };
            protocols.insert(pair, EndpointRegistry::new(pair, delivery));
        }

        let pairs: Vec<String> =
            protocols.keys().map(|p| p.to_string()).collect();
        let queued: Vec<String> =
            self.queued.keys().map(|t| t.to_string()).collect();
        self.ectx.log.log(
            LogLevel::Note,
            &format!(
                "demuxer created: pairs [{}] queued [{}]",
                pairs.join(", "),
                queued.join(", ")
            ),
        );

        Ok(Demuxer {
            ectx: self.ectx,
            stats: self.stats.unwrap_or_default(),
            protocols,
        })
    }
}

/// Routes inbound packets to transport endpoints.
///
/// The set of protocol pairs is fixed at creation. Each pair has its
/// own [`EndpointRegistry`] and lock, so traffic for one pair never
/// waits on registration for another. No lock is held while an
/// endpoint or queue is called.
pub struct Demuxer {
    ectx: Arc<ExecCtx>,
    stats: Arc<StackStats>,
    protocols: BTreeMap<ProtocolPair, EndpointRegistry>,
}

impl Demuxer {
    fn registry(
        &self,
        net: NetworkProtocol,
        transport: TransportProtocol,
    ) -> Option<&EndpointRegistry> {
        self.protocols.get(&ProtocolPair::new(net, transport))
    }

    /// The counters this demuxer updates.
    pub fn stats(&self) -> &Arc<StackStats> {
        &self.stats
    }

    /// Register `ep` under `id` on `bind_nic` for `transport` over each
    /// of `net_protos`.
    ///
    /// Either every network protocol ends up with the registration or
    /// none do: on failure, the protocols already registered by this
    /// call are unwound before the error is returned.
    ///
    /// # Errors
    ///
    /// * [`DemuxError::UnknownProtocol`]: a pair isn't served by this
    ///   demuxer.
    /// * [`DemuxError::PortInUse`]: the binding is taken and reuse was
    ///   not agreed to by both sides.
    pub fn register_endpoint(
        &self,
        net_protos: &[NetworkProtocol],
        transport: TransportProtocol,
        id: EndpointId,
        ep: Arc<dyn TransportEndpoint>,
        reuse_port: bool,
        bind_nic: NicId,
    ) -> Result<()> {
        let uid = ep.unique_id();

        for (i, net) in net_protos.iter().enumerate() {
            let res = match self.registry(*net, transport) {
                Some(eps) => eps.register(
                    id,
                    bind_nic,
                    Arc::clone(&ep),
                    reuse_port,
                    &*self.ectx.seed,
                ),

                None => Err(DemuxError::UnknownProtocol {
                    net: *net,
                    transport,
                }),
            };

            if let Err(e) = res {
                if e == DemuxError::PortInUse {
                    self.ectx.log.log(
                        LogLevel::Note,
                        &format!(
                            "{net}/{transport} {id} nic {bind_nic}: port in use"
                        ),
                    );
                }

                let done = &net_protos[..i];
                if !done.is_empty() {
                    self.ectx.log.log(
                        LogLevel::Warn,
                        &format!(
                            "rolling back {transport} {id} on {} network \
                             protocol(s): {e}",
                            done.len()
                        ),
                    );
                }
                for prev in done.iter().rev() {
                    if let Some(eps) = self.registry(*prev, transport) {
                        eps.unregister(&id, bind_nic, uid);
                    }
                }
                return Err(e);
            }
        }

        Ok(())
    }

    /// Remove `ep` from `id` on `bind_nic` for each of `net_protos`.
    /// Pairs or bindings which don't exist are skipped.
    pub fn unregister_endpoint(
        &self,
        net_protos: &[NetworkProtocol],
        transport: TransportProtocol,
        id: EndpointId,
        ep: &dyn TransportEndpoint,
        bind_nic: NicId,
    ) {
        let uid = ep.unique_id();
        for net in net_protos {
            if let Some(eps) = self.registry(*net, transport) {
                eps.unregister(&id, bind_nic, uid);
            }
        }
    }

    /// Register a raw endpoint for the pair.
    ///
    /// # Errors
    ///
    /// [`DemuxError::NotSupported`] if the pair isn't served by this
    /// demuxer.
    pub fn register_raw_endpoint(
        &self,
        net: NetworkProtocol,
        transport: TransportProtocol,
        ep: Arc<dyn RawTransportEndpoint>,
    ) -> Result<()> {
        match self.registry(net, transport) {
            Some(eps) => {
                eps.add_raw(ep);
                Ok(())
            }

            None => {
                self.ectx.log.log(
                    LogLevel::Warn,
                    &format!("raw endpoint for unsupported pair {net}/{transport}"),
                );
                Err(DemuxError::NotSupported { net, transport })
            }
        }
    }

    /// Unregister a raw endpoint. Unregistering an endpoint which
    /// isn't registered does nothing.
    ///
    /// # Panics
    ///
    /// If the pair isn't served by this demuxer. A raw endpoint can
    /// only have been registered for a pair that is, so this is a bug
    /// in the caller's bookkeeping.
    pub fn unregister_raw_endpoint(
        &self,
        net: NetworkProtocol,
        transport: TransportProtocol,
        ep: &Arc<dyn RawTransportEndpoint>,
    ) {
        let Some(eps) = self.registry(net, transport) else {
            panic!(
                "unregister raw endpoint for unsupported protocol pair \
                 {net}/{transport}"
            );
        };
        eps.remove_raw(ep);
    }

    /// Deliver an inbound packet to the endpoint(s) bound to `id`.
    ///
    /// Return `true` if the packet has been dealt with and the caller
    /// must not process it further. A `false` return means no endpoint
    /// took the packet; the caller decides what to do about that
    /// (e.g., send a port unreachable).
    ///
    /// * A UDP-like datagram to a multicast or broadcast address goes
    ///   to every endpoint of every matching binding, resolved against
    ///   the receiving NIC.
    /// * A TCP-like segment with a non-unicast source or destination is
    ///   dropped and counted, and reported as handled.
    /// * Anything else goes to the single endpoint selected from the
    ///   most specific matching binding.
    pub fn deliver_packet(
        &self,
        route: &Route,
        transport: TransportProtocol,
        pkt: PacketBuffer,
        id: &EndpointId,
    ) -> bool {
        let Some(eps) = self.registry(route.net_proto, transport) else {
            return false;
        };

        if transport.is_udp_like()
            && id.local_addr.is_some_and(|a| a.is_multicast_or_broadcast())
        {
            let dests = eps.select_all_matches(id, route.nic);

            if dests.is_empty() {
                self.stats.udp.unknown_port_errors.incr();
                return false;
            }

            deliver_fan_out(eps.delivery(), route, id, dests, pkt);
            return true;
        }

        if transport.is_tcp_like()
            && (!route.local_addr.is_unicast() || !route.remote_addr.is_unicast())
        {
            self.stats.tcp.invalid_segments_received.incr();
            return true;
        }

        match eps.select_best(id, route.nic) {
            Some(ep) => {
                eps.delivery().deliver(route, ep, id, pkt);
                true
            }

            None => {
                if transport.is_udp_like() {
                    self.stats.udp.unknown_port_errors.incr();
                }
                false
            }
        }
    }

    /// Lend the packet to every raw endpoint of the pair. Return `true`
    /// if there was at least one.
    pub fn deliver_raw_packet(
        &self,
        route: &Route,
        transport: TransportProtocol,
        pkt: &PacketBuffer,
    ) -> bool {
        let Some(eps) = self.registry(route.net_proto, transport) else {
            return false;
        };

        let raw = eps.raw_endpoints();
        for ep in &raw {
            ep.handle_packet(route, pkt);
        }
        !raw.is_empty()
    }

    /// Deliver a control message about the flow `id` to the endpoint
    /// which would receive that flow's packets on `nic`.
    ///
    /// Control messages are never fanned out, even for a multicast
    /// `id`, and never queued. Return `true` if an endpoint was found.
    #[allow(clippy::too_many_arguments)]
    pub fn deliver_control_packet(
        &self,
        nic: NicId,
        net: NetworkProtocol,
        transport: TransportProtocol,
        typ: ControlType,
        extra: u32,
        pkt: PacketBuffer,
        id: &EndpointId,
    ) -> bool {
        match self.find_transport_endpoint(net, transport, id, nic) {
            Some(ep) => {
                ep.handle_control_packet(id, typ, extra, pkt);
                true
            }

            None => false,
        }
    }

    /// Find the endpoint a packet for `id` arriving on `nic` would be
    /// delivered to, without delivering anything.
    pub fn find_transport_endpoint(
        &self,
        net: NetworkProtocol,
        transport: TransportProtocol,
        id: &EndpointId,
        nic: NicId,
    ) -> Option<Arc<dyn TransportEndpoint>> {
        self.registry(net, transport)?.select_best(id, nic)
    }

    /// Every non-raw endpoint registered for the pair.
    pub fn transport_endpoints(
        &self,
        net: NetworkProtocol,
        transport: TransportProtocol,
    ) -> Vec<Arc<dyn TransportEndpoint>> {
        self.registry(net, transport)
            .map(|eps| eps.transport_endpoints())
            .unwrap_or_default()
    }

    /// Dump the registrations of a pair.
    ///
    /// # Errors
    ///
    /// [`DemuxError::UnknownProtocol`] if the pair isn't served by this
    /// demuxer.
    pub fn dump(
        &self,
        net: NetworkProtocol,
        transport: TransportProtocol,
    ) -> Result<DumpEndpointsResp> {
        self.registry(net, transport)
            .map(|eps| eps.dump())
            .ok_or(DemuxError::UnknownProtocol { net, transport })
    }

    /// The protocol pairs served, and how each is delivered.
    pub fn protocols(&self) -> Vec<ProtocolDesc> {
        self.protocols
            .values()
            .map(|eps| ProtocolDesc {
                pair: eps.pair(),
                delivery: if eps.delivery().is_queued() {
                    DeliveryKind::Queued
                } else {
                    DeliveryKind::Direct
                },
            })
            .collect()
    }
}

impl core::fmt::Debug for Demuxer {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Demuxer")
            .field("protocols", &self.protocols.values().collect::<Vec<_>>())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::FixedSeed;
    use crate::provider::LogProvider;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CaptureLog(Mutex<Vec<String>>);

    impl LogProvider for Arc<CaptureLog> {
        fn log(&self, level: LogLevel, msg: &str) {
            self.0.lock().unwrap().push(format!("{level} {msg}"));
        }
    }

    struct NopEp(u64);

    impl TransportEndpoint for NopEp {
        fn unique_id(&self) -> u64 {
            self.0
        }

        fn handle_packet(&self, _: &Route, _: &EndpointId, _: PacketBuffer) {}

        fn handle_control_packet(
            &self,
            _: &EndpointId,
            _: ControlType,
            _: u32,
            _: PacketBuffer,
        ) {
        }
    }

    struct NopQueue;

    impl QueuedTransportProtocol for NopQueue {
        fn queue_packet(
            &self,
            _: &Route,
            _: Arc<dyn TransportEndpoint>,
            _: &EndpointId,
            _: PacketBuffer,
        ) {
        }
    }

    fn demuxer(log: Arc<CaptureLog>) -> Demuxer {
        let ectx =
            Arc::new(ExecCtx { log: Box::new(log), seed: Box::new(FixedSeed(3)) });
        DemuxerBuilder::new(&DemuxCfg::default(), ectx)
            .unwrap()
            .queued(TransportProtocol::TCP, Arc::new(NopQueue))
            .create()
            .unwrap()
    }

    #[test]
    fn builder_rejects_unconfigured_queue() {
        let ectx = Arc::new(ExecCtx {
            log: Box::new(Arc::new(CaptureLog::default())),
            seed: Box::new(FixedSeed(3)),
        });
        let cfg = DemuxCfg {
            network_protocols: vec![NetworkProtocol::Ipv4],
            transport_protocols: vec![TransportProtocol::UDP],
        };
        let res = DemuxerBuilder::new(&cfg, ectx)
            .unwrap()
            .queued(TransportProtocol::TCP, Arc::new(NopQueue))
            .create();
        assert!(matches!(res, Err(DemuxError::BadConfig(_))));
    }

    #[test]
    fn builder_rejects_bad_cfg() {
        let ectx = Arc::new(ExecCtx {
            log: Box::new(Arc::new(CaptureLog::default())),
            seed: Box::new(FixedSeed(3)),
        });
        let cfg = DemuxCfg {
            network_protocols: vec![],
            transport_protocols: vec![TransportProtocol::UDP],
        };
        assert!(matches!(
            DemuxerBuilder::new(&cfg, ectx),
            Err(DemuxError::BadConfig(_))
        ));
    }

    #[test]
    fn protocols_report_delivery() {
        let dm = demuxer(Arc::new(CaptureLog::default()));
        let protos = dm.protocols();
        assert_eq!(protos.len(), 8);
        for p in protos {
            let want = if p.pair.transport == TransportProtocol::TCP {
                DeliveryKind::Queued
            } else {
                DeliveryKind::Direct
            };
            assert_eq!(p.delivery, want, "{}", p.pair);
        }
    }

    #[test]
    fn logs_creation_collision_and_rollback() {
        let log = Arc::new(CaptureLog::default());
        let dm = demuxer(Arc::clone(&log));
        let id = EndpointId::listen(53);
        let v6_only = [NetworkProtocol::Ipv6];
        let dual = [NetworkProtocol::Ipv4, NetworkProtocol::Ipv6];

        dm.register_endpoint(
            &v6_only,
            TransportProtocol::UDP,
            id,
            Arc::new(NopEp(1)),
            false,
            NicId::ANY,
        )
        .unwrap();
        let res = dm.register_endpoint(
            &dual,
            TransportProtocol::UDP,
            id,
            Arc::new(NopEp(2)),
            false,
            NicId::ANY,
        );
        assert_eq!(res, Err(DemuxError::PortInUse));

        let msgs = log.0.lock().unwrap();
        assert!(msgs[0].starts_with("[NOTE] demuxer created"), "{}", msgs[0]);
        assert!(msgs[0].contains("queued [TCP]"), "{}", msgs[0]);
        assert!(msgs[1].contains("port in use"), "{}", msgs[1]);
        assert!(msgs[2].starts_with("[WARN] rolling back"), "{}", msgs[2]);
        assert_eq!(msgs.len(), 3);
    }

    #[test]
    fn dump_unknown_pair() {
        let dm = demuxer(Arc::new(CaptureLog::default()));
        assert_eq!(
            dm.dump(NetworkProtocol::Arp, TransportProtocol::UDP),
            Err(DemuxError::UnknownProtocol {
                net: NetworkProtocol::Arp,
                transport: TransportProtocol::UDP,
            })
        );
    }
}
