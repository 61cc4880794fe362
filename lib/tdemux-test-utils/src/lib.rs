// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

use slog::Drain;
use std::sync::Mutex;

// Let's make our lives easier and pub use a bunch of stuff.
pub use tdemux::ExecCtx;
pub use tdemux::api::*;
pub use tdemux::engine::Demuxer;
pub use tdemux::engine::DemuxerBuilder;
pub use tdemux::engine::DeliveryMode;
pub use tdemux::engine::PacketBuffer;
pub use tdemux::engine::QueuedTransportProtocol;
pub use tdemux::engine::RawTransportEndpoint;
pub use tdemux::engine::Route;
pub use tdemux::engine::TransportEndpoint;
pub use tdemux::engine::endpoint::next_unique_id;
pub use tdemux::engine::stat::StackStats;
pub use tdemux::print::print_endpoints_into;
pub use tdemux::provider::FixedSeed;
pub use tdemux::provider::PrintlnLog;
pub use tdemux::provider::RandSeed;
pub use tdemux::provider::SlogLog;
pub use std::sync::Arc;

/// Expects that `$ep` has received exactly `$count` packets.
#[macro_export]
macro_rules! expect_delivered {
    ($ep:expr, $count:expr) => {
        assert_eq!(
            $ep.rx_count(),
            $count,
            "endpoint {} received {} packet(s), expected {}",
            $ep.uid(),
            $ep.rx_count(),
            $count,
        );
    };
}

/// A packet as seen by a [`RecordingEndpoint`].
#[derive(Clone, Debug)]
pub struct Rx {
    pub route: Route,
    pub id: EndpointId,
    pub data: Vec<u8>,
    /// The address of the delivered buffer, to tell an original
    /// apart from a duplicate.
    pub buf_addr: usize,
}

/// A control message as seen by a [`RecordingEndpoint`].
#[derive(Clone, Debug)]
pub struct CtlRx {
    pub id: EndpointId,
    pub typ: ControlType,
    pub extra: u32,
    pub data: Vec<u8>,
}

/// A transport endpoint which records everything handed to it.
#[derive(Debug)]
pub struct RecordingEndpoint {
    uid: u64,
    rx: Mutex<Vec<Rx>>,
    ctl: Mutex<Vec<CtlRx>>,
}

impl RecordingEndpoint {
    pub fn new() -> Arc<Self> {
        Self::with_uid(next_unique_id())
    }

    pub fn with_uid(uid: u64) -> Arc<Self> {
        Arc::new(Self { uid, rx: Mutex::new(vec![]), ctl: Mutex::new(vec![]) })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn rx_count(&self) -> usize {
        self.rx.lock().unwrap().len()
    }

    pub fn received(&self) -> Vec<Rx> {
        self.rx.lock().unwrap().clone()
    }

    pub fn controls(&self) -> Vec<CtlRx> {
        self.ctl.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.rx.lock().unwrap().clear();
        self.ctl.lock().unwrap().clear();
    }
}

impl TransportEndpoint for RecordingEndpoint {
    fn unique_id(&self) -> u64 {
        self.uid
    }

    fn handle_packet(&self, route: &Route, id: &EndpointId, pkt: PacketBuffer) {
        let buf_addr = pkt.as_bytes().as_ptr() as usize;
        self.rx.lock().unwrap().push(Rx {
            route: *route,
            id: *id,
            data: pkt.into_inner(),
            buf_addr,
        });
    }

    fn handle_control_packet(
        &self,
        id: &EndpointId,
        typ: ControlType,
        extra: u32,
        pkt: PacketBuffer,
    ) {
        self.ctl.lock().unwrap().push(CtlRx {
            id: *id,
            typ,
            extra,
            data: pkt.into_inner(),
        });
    }
}

/// A raw endpoint which records a copy of everything lent to it.
#[derive(Debug, Default)]
pub struct RecordingRawEndpoint {
    rx: Mutex<Vec<(Route, Vec<u8>)>>,
}

impl RecordingRawEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rx_count(&self) -> usize {
        self.rx.lock().unwrap().len()
    }

    pub fn received(&self) -> Vec<(Route, Vec<u8>)> {
        self.rx.lock().unwrap().clone()
    }
}

impl RawTransportEndpoint for RecordingRawEndpoint {
    fn handle_packet(&self, route: &Route, pkt: &PacketBuffer) {
        self.rx.lock().unwrap().push((*route, pkt.as_bytes().to_vec()));
    }
}

/// A packet handed to a [`RecordingQueue`].
#[derive(Clone, Debug)]
pub struct Queued {
    pub route: Route,
    pub ep_uid: u64,
    pub id: EndpointId,
    pub data: Vec<u8>,
    pub buf_addr: usize,
}

/// A queued transport protocol which holds packets until drained.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    q: Mutex<Vec<(Queued, Arc<dyn TransportEndpoint>)>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.q.lock().unwrap().len()
    }

    pub fn queued(&self) -> Vec<Queued> {
        self.q.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }

    /// Hand every queued packet to its endpoint, in queue order, and
    /// return how many there were.
    pub fn drain(&self) -> usize {
        let pending: Vec<_> = self.q.lock().unwrap().drain(..).collect();
        let n = pending.len();
        for (q, ep) in pending {
            ep.handle_packet(&q.route, &q.id, PacketBuffer::new(q.data));
        }
        n
    }
}

impl QueuedTransportProtocol for RecordingQueue {
    fn queue_packet(
        &self,
        route: &Route,
        ep: Arc<dyn TransportEndpoint>,
        id: &EndpointId,
        pkt: PacketBuffer,
    ) {
        let buf_addr = pkt.as_bytes().as_ptr() as usize;
        let q = Queued {
            route: *route,
            ep_uid: ep.unique_id(),
            id: *id,
            data: pkt.into_inner(),
            buf_addr,
        };
        self.q.lock().unwrap().push((q, ep));
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A route for a packet from `remote` to `local` received on `nic`.
/// The network protocol follows the address family.
pub fn route(nic: u32, local: &str, remote: &str) -> Route {
    let local_addr = ip(local);
    let net_proto = match local_addr {
        IpAddr::Ip4(_) => NetworkProtocol::Ipv4,
        IpAddr::Ip6(_) => NetworkProtocol::Ipv6,
    };
    Route { net_proto, nic: NicId(nic), local_addr, remote_addr: ip(remote) }
}

/// The id the network layer builds for a packet from `remote:rport`
/// to `local:lport`.
pub fn inbound_id(
    local: &str,
    lport: u16,
    remote: &str,
    rport: u16,
) -> EndpointId {
    EndpointId::connected((ip(local), lport), (ip(remote), rport))
}

pub fn as_ep(ep: &Arc<RecordingEndpoint>) -> Arc<dyn TransportEndpoint> {
    Arc::clone(ep) as Arc<dyn TransportEndpoint>
}

pub fn as_raw(ep: &Arc<RecordingRawEndpoint>) -> Arc<dyn RawTransportEndpoint> {
    Arc::clone(ep) as Arc<dyn RawTransportEndpoint>
}

/// A logger writing to the test harness's captured stdout.
pub fn test_logger() -> slog::Logger {
    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

/// An execution context with a fixed selection seed.
pub fn test_ectx(seed: u32) -> Arc<ExecCtx> {
    Arc::new(ExecCtx {
        log: Box::new(SlogLog::new(test_logger())),
        seed: Box::new(FixedSeed(seed)),
    })
}

/// A demuxer for the default dual-stack configuration.
pub fn default_demuxer() -> Demuxer {
    DemuxerBuilder::new(&DemuxCfg::default(), test_ectx(0x5eed))
        .unwrap()
        .create()
        .unwrap()
}

/// A demuxer for the default configuration, with TCP queued on `q`.
pub fn queued_tcp_demuxer(q: &Arc<RecordingQueue>) -> Demuxer {
    DemuxerBuilder::new(&DemuxCfg::default(), test_ectx(0x5eed))
        .unwrap()
        .queued(
            TransportProtocol::TCP,
            Arc::clone(q) as Arc<dyn QueuedTransportProtocol>,
        )
        .create()
        .unwrap()
}

/// Register `ep` for UDP over IPv4 only.
pub fn bind_udp4(
    dm: &Demuxer,
    id: EndpointId,
    ep: &Arc<RecordingEndpoint>,
    reuse: bool,
    nic: u32,
) -> Result<(), DemuxError> {
    dm.register_endpoint(
        &[NetworkProtocol::Ipv4],
        TransportProtocol::UDP,
        id,
        as_ep(ep),
        reuse,
        NicId(nic),
    )
}
